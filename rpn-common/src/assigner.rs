//! Report number assignment
//!
//! [`IdentifierAssigner::assign`] runs one attempt against a record:
//!
//! 1. Stop if the record already has a report number
//! 2. Validate required fields (interactive attempts)
//! 3. Compute patterns; write the base pattern to `pattern` right away
//! 4. Validate required fields silently (background attempts)
//! 5. Compute the next sequence from the trackers
//! 6. Replace whichever trackers the new sequence beats
//! 7. Write identifier, part number and revision, then lock the identifier
//! 8. Save the record if the host can
//!
//! The procedure is synchronous and never waits on anything, so a caller
//! holding a busy flag around it is guaranteed to get it back.

use crate::config::RpnConfig;
use crate::error::Rejection;
use crate::fields::{Field, FieldStore};
use crate::identifier::{ReportNumber, DEFAULT_REVISION, DEFAULT_SEQUENCE_WIDTH};
use crate::pattern::PatternFields;
use crate::sequence::{next_sequence, update_trackers, TrackerUpdate};
use tracing::{debug, error, warn};

/// Per-attempt options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignOptions {
    /// Interactive attempt: gate failures are reported to the user
    pub validate: bool,
}

impl AssignOptions {
    pub fn interactive() -> Self {
        Self { validate: true }
    }

    pub fn background() -> Self {
        Self { validate: false }
    }
}

/// Result of the save step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    /// Record saved
    Saved,
    /// Host has no save capability
    Unsupported,
    /// Save failed; the in-memory assignment stands
    Failed(String),
}

/// A successfully issued report number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub identifier: ReportNumber,
    pub trackers: TrackerUpdate,
    pub persistence: Persistence,
}

/// Issues report numbers against a record
#[derive(Debug, Clone)]
pub struct IdentifierAssigner {
    revision: String,
    sequence_width: usize,
}

impl Default for IdentifierAssigner {
    fn default() -> Self {
        Self::new(DEFAULT_REVISION, DEFAULT_SEQUENCE_WIDTH)
    }
}

impl IdentifierAssigner {
    pub fn new(revision: impl Into<String>, sequence_width: usize) -> Self {
        Self {
            revision: revision.into(),
            sequence_width,
        }
    }

    pub fn from_config(config: &RpnConfig) -> Self {
        Self::new(config.revision.clone(), config.sequence_width)
    }

    /// Run one assignment attempt
    ///
    /// On any `Err` the identifier field is left as it was found.
    pub fn assign<S: FieldStore + ?Sized>(
        &self,
        store: &mut S,
        options: AssignOptions,
    ) -> Result<Assignment, Rejection> {
        if !store.read(Field::Identifier).is_empty() {
            return Err(Rejection::AlreadyAssigned);
        }

        if options.validate {
            if let Some(field) = first_missing_field(store) {
                return Err(Rejection::MissingField(field));
            }
        }

        let fields = PatternFields::read_from(store);
        let base = fields.build_base();
        let full = fields.build_full();
        if !store.write(Field::Pattern, &base) {
            warn!("Host refused write to '{}' field", Field::Pattern);
        }

        if !options.validate {
            if let Some(field) = first_missing_field(store) {
                debug!("Background attempt stopped: '{}' is empty", field);
                return Err(Rejection::MissingField(field));
            }
        }

        let max_tracker = store.read(Field::MaxTracker);
        let min_tracker = store.read(Field::MinTracker);
        let sequence = next_sequence(&max_tracker, &store.read(Field::DefaultSeed))
            .map_err(sequence_failure)?;
        let identifier = ReportNumber::new(full, sequence, self.revision.clone())
            .with_width(self.sequence_width);
        let rendered = identifier.to_string();

        let trackers =
            update_trackers(sequence, &min_tracker, &max_tracker).map_err(sequence_failure)?;
        if trackers.write_max && !store.write(Field::MaxTracker, &rendered) {
            return Err(refused(Field::MaxTracker));
        }
        if trackers.write_min && !store.write(Field::MinTracker, &rendered) {
            return Err(refused(Field::MinTracker));
        }

        self.write_final(store, &identifier, &rendered)?;

        let persistence = if store.can_save() {
            match store.save() {
                Ok(()) => Persistence::Saved,
                Err(e) => {
                    warn!("Record save failed after assigning {}: {}", rendered, e);
                    Persistence::Failed(e.to_string())
                }
            }
        } else {
            Persistence::Unsupported
        };

        Ok(Assignment {
            identifier,
            trackers,
            persistence,
        })
    }

    /// Write the outputs and lock the identifier, or leave it empty
    fn write_final<S: FieldStore + ?Sized>(
        &self,
        store: &mut S,
        identifier: &ReportNumber,
        rendered: &str,
    ) -> Result<(), Rejection> {
        if !store.write(Field::Identifier, rendered) {
            return Err(refused(Field::Identifier));
        }

        let outputs = [
            (Field::PartNumber, identifier.part_number()),
            (Field::Revision, identifier.revision.clone()),
        ];
        for (field, value) in outputs {
            if !store.write(field, &value) {
                if !store.write(Field::Identifier, "") {
                    error!("Could not clear partially written identifier {}", rendered);
                }
                return Err(refused(field));
            }
        }

        store.set_editable(Field::Identifier, false);
        Ok(())
    }
}

/// First empty required field, in check order
pub fn first_missing_field<S: FieldStore + ?Sized>(store: &S) -> Option<Field> {
    Field::REQUIRED
        .iter()
        .copied()
        .find(|field| store.read(*field).is_empty())
}

fn sequence_failure(e: crate::Error) -> Rejection {
    Rejection::UnexpectedFailure(e.to_string())
}

fn refused(field: Field) -> Rejection {
    Rejection::UnexpectedFailure(format!("host refused write to '{}'", field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::MemoryFieldStore;
    use crate::Error;

    fn complete_record() -> MemoryFieldStore {
        MemoryFieldStore::new()
            .with(Field::Constant, "SJSC-")
            .with(Field::Location, "GGN")
            .with(Field::Contractor, "RSP")
            .with(Field::Process, "MO")
            .with(Field::Subprocess, "WP")
            .with(Field::MainGroup, "RE")
            .with(Field::TimePeriod, "DA")
            .with(Field::Subject, "Daily production")
            .with(Field::Date, "2024-10-01")
    }

    /// Store wrapper that refuses writes to one field
    struct RefusingStore {
        inner: MemoryFieldStore,
        refuse: Field,
    }

    impl FieldStore for RefusingStore {
        fn read(&self, field: Field) -> String {
            self.inner.read(field)
        }

        fn write(&mut self, field: Field, value: &str) -> bool {
            field != self.refuse && self.inner.write(field, value)
        }

        fn set_editable(&mut self, field: Field, editable: bool) {
            self.inner.set_editable(field, editable)
        }
    }

    /// Store with a save capability that can be made to fail
    struct SavingStore {
        inner: MemoryFieldStore,
        fail: bool,
        saves: usize,
    }

    impl FieldStore for SavingStore {
        fn read(&self, field: Field) -> String {
            self.inner.read(field)
        }

        fn write(&mut self, field: Field, value: &str) -> bool {
            self.inner.write(field, value)
        }

        fn can_save(&self) -> bool {
            true
        }

        fn save(&mut self) -> crate::Result<()> {
            self.saves += 1;
            if self.fail {
                Err(Error::Io(std::io::Error::other("disk full")))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_first_assignment_bootstraps_at_one() {
        let mut store = complete_record();
        let assignment = IdentifierAssigner::default()
            .assign(&mut store, AssignOptions::interactive())
            .unwrap();

        assert_eq!(assignment.identifier.to_string(), "SJSC-GGNRSP-MOWP-REDA-0001-G00");
        assert_eq!(store.read(Field::Identifier), "SJSC-GGNRSP-MOWP-REDA-0001-G00");
        assert_eq!(store.read(Field::Pattern), "SJSC-RSP-MOWP-REDA");
        assert_eq!(store.read(Field::PartNumber), "0001");
        assert_eq!(store.read(Field::Revision), "G00");
        assert_eq!(store.read(Field::MaxTracker), "SJSC-GGNRSP-MOWP-REDA-0001-G00");
        assert_eq!(store.read(Field::MinTracker), "SJSC-GGNRSP-MOWP-REDA-0001-G00");
        assert!(!store.is_editable(Field::Identifier));
        assert_eq!(assignment.persistence, Persistence::Unsupported);
    }

    #[test]
    fn test_max_tracker_drives_next_number() {
        let mut store = complete_record()
            .with(Field::MaxTracker, "SJSC-GGNRSP-MOWP-REDA-0041-G00")
            .with(Field::MinTracker, "SJSC-GGNRSP-MOWP-REDA-0003-G00")
            .with(Field::DefaultSeed, "7");

        let assignment = IdentifierAssigner::default()
            .assign(&mut store, AssignOptions::background())
            .unwrap();

        assert_eq!(assignment.identifier.sequence, 42);
        assert!(assignment.trackers.write_max);
        assert!(!assignment.trackers.write_min);
        assert_eq!(store.read(Field::MaxTracker), "SJSC-GGNRSP-MOWP-REDA-0042-G00");
        assert_eq!(store.read(Field::MinTracker), "SJSC-GGNRSP-MOWP-REDA-0003-G00");
    }

    #[test]
    fn test_default_seed_used_without_max() {
        let mut store = complete_record().with(Field::DefaultSeed, "PFX-0007-G00");
        let assignment = IdentifierAssigner::default()
            .assign(&mut store, AssignOptions::interactive())
            .unwrap();
        assert_eq!(assignment.identifier.part_number(), "0007");
    }

    #[test]
    fn test_already_assigned_changes_nothing() {
        let mut store = complete_record();
        let assigner = IdentifierAssigner::default();
        assigner.assign(&mut store, AssignOptions::interactive()).unwrap();
        let before = store.to_map();

        for options in [AssignOptions::interactive(), AssignOptions::background()] {
            let result = assigner.assign(&mut store, options);
            assert_eq!(result, Err(Rejection::AlreadyAssigned));
        }
        assert_eq!(store.to_map(), before);
    }

    #[test]
    fn test_interactive_validation_reports_first_missing_in_order() {
        let mut store = complete_record()
            .with(Field::Process, "")
            .with(Field::Subject, "");

        let result = IdentifierAssigner::default().assign(&mut store, AssignOptions::interactive());
        assert_eq!(result, Err(Rejection::MissingField(Field::Process)));
        // Gate runs before any write
        assert_eq!(store.read(Field::Pattern), "");
        assert_eq!(store.read(Field::Identifier), "");
    }

    #[test]
    fn test_background_validation_writes_pattern_then_stops() {
        let mut store = complete_record().with(Field::Date, "");

        let result = IdentifierAssigner::default().assign(&mut store, AssignOptions::background());
        assert_eq!(result, Err(Rejection::MissingField(Field::Date)));
        assert_eq!(store.read(Field::Pattern), "SJSC-RSP-MOWP-REDA");
        assert_eq!(store.read(Field::Identifier), "");
        assert_eq!(store.read(Field::MaxTracker), "");
    }

    #[test]
    fn test_constant_is_not_required() {
        let mut store = complete_record().with(Field::Constant, "");
        let assignment = IdentifierAssigner::default()
            .assign(&mut store, AssignOptions::interactive())
            .unwrap();
        assert_eq!(assignment.identifier.to_string(), "GGNRSP-MOWP-REDA-0001-G00");
    }

    #[test]
    fn test_refused_identifier_write_is_unexpected_failure() {
        let mut store = RefusingStore {
            inner: complete_record(),
            refuse: Field::Identifier,
        };
        let result = IdentifierAssigner::default().assign(&mut store, AssignOptions::interactive());
        assert!(matches!(result, Err(Rejection::UnexpectedFailure(_))));
        assert_eq!(store.read(Field::Identifier), "");
    }

    #[test]
    fn test_refused_part_number_write_clears_identifier() {
        let mut store = RefusingStore {
            inner: complete_record(),
            refuse: Field::PartNumber,
        };
        let result = IdentifierAssigner::default().assign(&mut store, AssignOptions::interactive());
        assert!(matches!(result, Err(Rejection::UnexpectedFailure(_))));
        assert_eq!(store.read(Field::Identifier), "");
        assert!(store.inner.is_editable(Field::Identifier));
    }

    #[test]
    fn test_refused_pattern_write_is_not_fatal() {
        let mut store = RefusingStore {
            inner: complete_record(),
            refuse: Field::Pattern,
        };
        let result = IdentifierAssigner::default().assign(&mut store, AssignOptions::interactive());
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_called_when_supported() {
        let mut store = SavingStore {
            inner: complete_record(),
            fail: false,
            saves: 0,
        };
        let assignment = IdentifierAssigner::default()
            .assign(&mut store, AssignOptions::interactive())
            .unwrap();
        assert_eq!(assignment.persistence, Persistence::Saved);
        assert_eq!(store.saves, 1);
    }

    #[test]
    fn test_save_failure_keeps_assignment() {
        let mut store = SavingStore {
            inner: complete_record(),
            fail: true,
            saves: 0,
        };
        let assignment = IdentifierAssigner::default()
            .assign(&mut store, AssignOptions::interactive())
            .unwrap();
        assert!(matches!(assignment.persistence, Persistence::Failed(_)));
        assert_eq!(store.read(Field::Identifier), "SJSC-GGNRSP-MOWP-REDA-0001-G00");
    }

    #[test]
    fn test_max_tracker_beyond_32_bits_keeps_counting() {
        let mut store = complete_record().with(Field::MaxTracker, "SJSC-GGNRSP-MOWP-REDA-4294967295-G00");
        let assignment = IdentifierAssigner::default()
            .assign(&mut store, AssignOptions::interactive())
            .unwrap();

        assert_eq!(assignment.identifier.sequence, 4_294_967_296);
        assert!(assignment.trackers.write_max);
        assert_eq!(store.read(Field::MaxTracker), "SJSC-GGNRSP-MOWP-REDA-4294967296-G00");
    }

    #[test]
    fn test_oversized_max_tracker_aborts_without_writes() {
        let max = "SJSC-GGNRSP-MOWP-REDA-99999999999999999999-G00";
        let mut store = complete_record()
            .with(Field::MaxTracker, max)
            .with(Field::DefaultSeed, "7");

        let result = IdentifierAssigner::default().assign(&mut store, AssignOptions::interactive());
        assert!(matches!(result, Err(Rejection::UnexpectedFailure(_))));
        assert_eq!(store.read(Field::MaxTracker), max);
        assert_eq!(store.read(Field::MinTracker), "");
        assert_eq!(store.read(Field::Identifier), "");
    }

    #[test]
    fn test_exhausted_max_tracker_issues_no_duplicate() {
        let max = format!("SJSC-GGNRSP-MOWP-REDA-{}-G00", u64::MAX);
        let mut store = complete_record().with(Field::MaxTracker, max.as_str());

        let result = IdentifierAssigner::default().assign(&mut store, AssignOptions::interactive());
        assert!(matches!(result, Err(Rejection::UnexpectedFailure(_))));
        assert_eq!(store.read(Field::MaxTracker), max);
        assert_eq!(store.read(Field::Identifier), "");
    }

    #[test]
    fn test_configured_revision_and_width() {
        let mut store = complete_record().with(Field::DefaultSeed, "12");
        let assignment = IdentifierAssigner::new("G01", 5)
            .assign(&mut store, AssignOptions::interactive())
            .unwrap();
        assert_eq!(assignment.identifier.to_string(), "SJSC-GGNRSP-MOWP-REDA-00012-G01");
        assert_eq!(store.read(Field::PartNumber), "00012");
        assert_eq!(store.read(Field::Revision), "G01");
    }
}

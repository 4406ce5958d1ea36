//! Pattern composition from categorical fields
//!
//! The base pattern is a computation key persisted to the `pattern` field.
//! The full pattern adds the location code and prefixes the report number.
//! Both are pure functions of the snapshot; validation happens elsewhere.

use crate::fields::{Field, FieldStore};

/// Snapshot of the categorical fields that feed the pattern
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternFields {
    pub constant: String,
    pub location: String,
    pub contractor: String,
    pub process: String,
    pub subprocess: String,
    pub main_group: String,
    pub time_period: String,
}

impl PatternFields {
    /// Read the pattern inputs from a record
    pub fn read_from<S: FieldStore + ?Sized>(store: &S) -> Self {
        Self {
            constant: store.read(Field::Constant),
            location: store.read(Field::Location),
            contractor: store.read(Field::Contractor),
            process: store.read(Field::Process),
            subprocess: store.read(Field::Subprocess),
            main_group: store.read(Field::MainGroup),
            time_period: store.read(Field::TimePeriod),
        }
    }

    /// `constant + contractor + "-" + process + subprocess + "-" + mainGroup + timePeriod`
    pub fn build_base(&self) -> String {
        self.compose("")
    }

    /// Base pattern with `location` immediately after `constant`
    pub fn build_full(&self) -> String {
        self.compose(&self.location)
    }

    fn compose(&self, location: &str) -> String {
        format!(
            "{}{}{}-{}{}-{}{}",
            self.constant,
            location,
            self.contractor,
            self.process,
            self.subprocess,
            self.main_group,
            self.time_period
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::MemoryFieldStore;

    fn sample() -> PatternFields {
        PatternFields {
            constant: "SJSC-".to_string(),
            location: "GGN".to_string(),
            contractor: "RSP".to_string(),
            process: "MO".to_string(),
            subprocess: "WP".to_string(),
            main_group: "RE".to_string(),
            time_period: "DA".to_string(),
        }
    }

    #[test]
    fn test_build_base_order_and_separators() {
        assert_eq!(sample().build_base(), "SJSC-RSP-MOWP-REDA");
    }

    #[test]
    fn test_build_full_inserts_location_after_constant() {
        assert_eq!(sample().build_full(), "SJSC-GGNRSP-MOWP-REDA");
    }

    #[test]
    fn test_full_is_base_with_location_spliced() {
        let cases = [
            sample(),
            PatternFields::default(),
            PatternFields {
                location: "X".to_string(),
                ..PatternFields::default()
            },
            PatternFields {
                constant: "C".to_string(),
                location: "LOC-".to_string(),
                time_period: "W".to_string(),
                ..sample()
            },
        ];

        for fields in cases {
            let base = fields.build_base();
            let full = fields.build_full();
            let mut expected = String::new();
            expected.push_str(&fields.constant);
            expected.push_str(&fields.location);
            expected.push_str(&base[fields.constant.len()..]);
            assert_eq!(full, expected);
        }
    }

    #[test]
    fn test_empty_fields_concatenate_as_empty() {
        let fields = PatternFields::default();
        assert_eq!(fields.build_base(), "--");
        assert_eq!(fields.build_full(), "--");
    }

    #[test]
    fn test_read_from_store_uses_trimmed_values() {
        let store = MemoryFieldStore::new()
            .with(Field::Constant, "SJSC-")
            .with(Field::Location, " GGN ")
            .with(Field::Contractor, "RSP")
            .with(Field::Process, "PD")
            .with(Field::Subprocess, "ME")
            .with(Field::MainGroup, "RE")
            .with(Field::TimePeriod, "WK");

        let fields = PatternFields::read_from(&store);
        assert_eq!(fields.build_full(), "SJSC-GGNRSP-PDME-REWK");
    }
}

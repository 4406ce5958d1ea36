//! Integration tests for report number assignment across a collection
//!
//! Tests the implementation of:
//! - Single assignment per record (idempotence)
//! - Max/min trackers following the issued sequences
//! - Priority chain between max tracker, default seed and bootstrap
//! - Validation ordering

use rpn_common::sequence::{extract_sequence, update_trackers};
use rpn_common::{
    AssignOptions, Field, FieldStore, IdentifierAssigner, MemoryFieldStore, Rejection,
    ReportNumber,
};

fn record(subject: &str) -> MemoryFieldStore {
    MemoryFieldStore::new()
        .with(Field::Constant, "SJSC-")
        .with(Field::Location, "GGN")
        .with(Field::Contractor, "RSP")
        .with(Field::Process, "EP")
        .with(Field::Subprocess, "WC")
        .with(Field::MainGroup, "RE")
        .with(Field::TimePeriod, "DA")
        .with(Field::Subject, subject)
        .with(Field::Date, "2024-10-01")
}

/// Carry the collection's trackers into a new record
fn with_trackers(store: MemoryFieldStore, min: &str, max: &str) -> MemoryFieldStore {
    store.with(Field::MinTracker, min).with(Field::MaxTracker, max)
}

#[test]
fn test_sequential_records_number_upwards() {
    let assigner = IdentifierAssigner::default();
    let (mut min, mut max) = (String::new(), String::new());
    let mut issued = Vec::new();

    for i in 0..5 {
        let mut store = with_trackers(record(&format!("Report {}", i)), &min, &max);
        let assignment = assigner
            .assign(&mut store, AssignOptions::interactive())
            .unwrap();
        issued.push(assignment.identifier.sequence);
        min = store.read(Field::MinTracker);
        max = store.read(Field::MaxTracker);
    }

    assert_eq!(issued, vec![1, 2, 3, 4, 5]);
    assert_eq!(max, "SJSC-GGNRSP-EPWC-REDA-0005-G00");
    assert_eq!(min, "SJSC-GGNRSP-EPWC-REDA-0001-G00");
}

#[test]
fn test_default_seed_starts_collection() {
    let assigner = IdentifierAssigner::default();
    let mut first = record("Seeded").with(Field::DefaultSeed, "SJSC-GGNRSP-EPWC-REDA-0060-G00");
    let assignment = assigner.assign(&mut first, AssignOptions::background()).unwrap();
    assert_eq!(assignment.identifier.sequence, 60);

    // Once a max exists the seed no longer matters
    let mut second = with_trackers(
        record("Next").with(Field::DefaultSeed, "60"),
        &first.read(Field::MinTracker),
        &first.read(Field::MaxTracker),
    );
    let assignment = assigner.assign(&mut second, AssignOptions::background()).unwrap();
    assert_eq!(assignment.identifier.sequence, 61);
}

#[test]
fn test_trackers_hold_extremes_regardless_of_order() {
    let orders: [&[u64]; 4] = [
        &[1, 2, 3, 4, 5],
        &[5, 4, 3, 2, 1],
        &[3, 1, 5, 2, 4],
        &[2, 2, 9, 9, 1],
    ];

    for order in orders {
        let (mut min, mut max) = (String::new(), String::new());
        for &sequence in order {
            let identifier = ReportNumber::new("SJSC-GGNRSP-EPWC-REDA", sequence, "G00").to_string();
            let update = update_trackers(sequence, &min, &max).unwrap();
            if update.write_max {
                max = identifier.clone();
            }
            if update.write_min {
                min = identifier;
            }
        }

        assert_eq!(extract_sequence(&max).unwrap(), order.iter().copied().max(), "order {:?}", order);
        assert_eq!(extract_sequence(&min).unwrap(), order.iter().copied().min(), "order {:?}", order);
    }
}

#[test]
fn test_second_assignment_leaves_record_unchanged() {
    let assigner = IdentifierAssigner::default();
    let mut store = record("Once");
    assigner.assign(&mut store, AssignOptions::interactive()).unwrap();

    let identifier = store.read(Field::Identifier);
    let max = store.read(Field::MaxTracker);
    let min = store.read(Field::MinTracker);
    let revision = store.read(Field::Revision);

    assert_eq!(
        assigner.assign(&mut store, AssignOptions::interactive()),
        Err(Rejection::AlreadyAssigned)
    );
    assert_eq!(store.read(Field::Identifier), identifier);
    assert_eq!(store.read(Field::MaxTracker), max);
    assert_eq!(store.read(Field::MinTracker), min);
    assert_eq!(store.read(Field::Revision), revision);
}

#[test]
fn test_validation_reports_fields_in_fixed_order() {
    let assigner = IdentifierAssigner::default();
    let expectations = [
        (vec![Field::Process, Field::Subject], Field::Process),
        (vec![Field::Subject, Field::Date], Field::Subject),
        (vec![Field::Date, Field::Location], Field::Location),
        (vec![Field::Contractor, Field::TimePeriod], Field::TimePeriod),
        (vec![Field::Date], Field::Date),
    ];

    for (empty, expected) in expectations {
        let mut store = record("Validation");
        for field in &empty {
            store.write(*field, "");
        }
        assert_eq!(
            assigner.assign(&mut store, AssignOptions::interactive()),
            Err(Rejection::MissingField(expected)),
            "empty fields {:?}",
            empty
        );
    }
}

#[test]
fn test_malformed_trackers_are_treated_as_absent() {
    let assigner = IdentifierAssigner::default();
    let mut store = with_trackers(record("Malformed"), "n/a", "unknown").with(Field::DefaultSeed, "9");

    let assignment = assigner.assign(&mut store, AssignOptions::interactive()).unwrap();
    assert_eq!(assignment.identifier.sequence, 9);
    assert!(assignment.trackers.write_max);
    assert!(assignment.trackers.write_min);
    assert_eq!(store.read(Field::MaxTracker), "SJSC-GGNRSP-EPWC-REDA-0009-G00");
}

#[test]
fn test_wide_sequence_is_not_truncated() {
    let assigner = IdentifierAssigner::default();
    let mut store = with_trackers(record("Wide"), "", "SJSC-GGNRSP-EPWC-REDA-12344-G00");
    let assignment = assigner.assign(&mut store, AssignOptions::interactive()).unwrap();
    assert_eq!(store.read(Field::PartNumber), "12345");
    assert_eq!(assignment.identifier.to_string(), "SJSC-GGNRSP-EPWC-REDA-12345-G00");
}

#[test]
fn test_large_max_tracker_never_moves_down() {
    let assigner = IdentifierAssigner::default();
    let mut first = with_trackers(
        record("Past 32 bits"),
        "SJSC-GGNRSP-EPWC-REDA-0001-G00",
        "SJSC-GGNRSP-EPWC-REDA-5000000000-G00",
    );
    let assignment = assigner.assign(&mut first, AssignOptions::background()).unwrap();
    assert_eq!(assignment.identifier.sequence, 5_000_000_001);
    assert_eq!(first.read(Field::MaxTracker), "SJSC-GGNRSP-EPWC-REDA-5000000001-G00");
    assert_eq!(first.read(Field::MinTracker), "SJSC-GGNRSP-EPWC-REDA-0001-G00");

    // Digits past 64 bits stop the collection instead of restarting it
    let oversized = "SJSC-GGNRSP-EPWC-REDA-99999999999999999999-G00";
    let mut second = with_trackers(record("Oversized"), "", oversized);
    assert!(matches!(
        assigner.assign(&mut second, AssignOptions::background()),
        Err(Rejection::UnexpectedFailure(_))
    ));
    assert_eq!(second.read(Field::MaxTracker), oversized);
    assert_eq!(second.read(Field::Identifier), "");
}

//! One-shot command implementations

use anyhow::{Context, Result};
use rpn_common::events::EventBus;
use rpn_common::record::JsonRecordStore;
use rpn_common::sequence::{extract_seed, extract_sequence, next_sequence};
use rpn_common::timer::ManualTimer;
use rpn_common::{AttemptOutcome, Persistence, ReportNumber, RpnConfig, TriggerScheduler};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Run one attempt against a JSON record file
///
/// The record is saved by the assignment itself when a number is issued.
/// A one-shot run can never overlap another attempt, so the timer is
/// never driven.
pub fn generate(record: &Path, interactive: bool, config: &RpnConfig) -> Result<AttemptOutcome> {
    let store = JsonRecordStore::open(record)
        .with_context(|| format!("Failed to open record {}", record.display()))?;
    let scheduler = TriggerScheduler::new(store, ManualTimer::new(), config, EventBus::default());

    let outcome = scheduler.generate(interactive);
    info!("Attempt on {} finished", record.display());
    Ok(outcome)
}

/// Human-readable summary of an attempt
pub fn describe_outcome(outcome: &AttemptOutcome) -> String {
    match outcome {
        AttemptOutcome::Assigned(assignment) => match &assignment.persistence {
            Persistence::Failed(error) => format!(
                "{} (warning: record not saved: {})",
                assignment.identifier, error
            ),
            _ => assignment.identifier.to_string(),
        },
        AttemptOutcome::Rejected(rejection) => rejection.to_string(),
        AttemptOutcome::Deferred => "Attempt deferred: generation already in progress".to_string(),
    }
}

/// Result of tracker arithmetic for the `next` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextReport {
    pub max: Option<u64>,
    pub default: Option<u64>,
    pub next: u64,
}

pub fn next(max: &str, default: &str) -> Result<NextReport> {
    Ok(NextReport {
        max: extract_sequence(max).context("Invalid max tracker")?,
        default: extract_seed(default).context("Invalid default seed")?,
        next: next_sequence(max, default)?,
    })
}

/// Decomposed identifier for the `inspect` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub prefix: String,
    pub sequence: u64,
    pub part_number: String,
    pub revision: String,
    pub standard_revision: bool,
}

pub fn inspect(identifier: &str) -> Result<InspectReport> {
    let number: ReportNumber = identifier
        .parse()
        .with_context(|| format!("Cannot decompose '{}'", identifier))?;
    Ok(InspectReport {
        part_number: number.part_number(),
        standard_revision: number.is_standard_revision(),
        prefix: number.prefix,
        sequence: number.sequence,
        revision: number.revision,
    })
}

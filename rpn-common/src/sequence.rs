//! Sequence number tracking
//!
//! The max and min trackers hold whole report numbers; the sequence is read
//! back out of their trailer. Values without a trailer are treated as absent
//! and fall through the priority chain. A trailer whose digits do not fit in
//! a `u64` is an error, never absent.

use crate::identifier::split_trailer;
use crate::{Error, Result};
use tracing::warn;

/// Which trackers an assignment should overwrite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerUpdate {
    pub write_max: bool,
    pub write_min: bool,
}

/// Sequence embedded in a tracker value (`...-<digits>-<alphanumeric>`)
///
/// Returns `Ok(None)` when the value does not end in the trailer and
/// [`Error::SequenceOverflow`] when the digits exceed `u64`.
pub fn extract_sequence(value: &str) -> Result<Option<u64>> {
    match split_trailer(value.trim()) {
        Some((_, digits, _)) => parse_digits(digits).map(Some),
        None => Ok(None),
    }
}

/// Sequence from the default-seed field
///
/// A bare integer is taken as-is; otherwise the trailer rule applies.
pub fn extract_seed(value: &str) -> Result<Option<u64>> {
    let trimmed = value.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return parse_digits(trimmed).map(Some);
    }
    extract_sequence(trimmed)
}

/// Next sequence to issue
///
/// Priority: max tracker + 1, then the default seed, then 1. A max tracker
/// already at `u64::MAX` has no successor and is an error.
pub fn next_sequence(max_tracker: &str, default_seed: &str) -> Result<u64> {
    if let Some(max) = parse_tracker("maxTracker", max_tracker)? {
        return max.checked_add(1).ok_or_else(|| {
            Error::SequenceOverflow(format!("no sequence after maxTracker {}", max))
        });
    }

    match extract_seed(default_seed)? {
        Some(seed) => Ok(seed),
        None => {
            if !default_seed.trim().is_empty() {
                warn!("Malformed default seed '{}', starting at 1", default_seed.trim());
            }
            Ok(1)
        }
    }
}

/// Decide which trackers a newly issued sequence replaces
///
/// Empty or unparseable trackers are always replaced. The two decisions are
/// independent, and a sequence that is neither a new max nor a new min
/// replaces neither.
pub fn update_trackers(
    new_sequence: u64,
    current_min: &str,
    current_max: &str,
) -> Result<TrackerUpdate> {
    let write_max = match parse_tracker("maxTracker", current_max)? {
        Some(max) => new_sequence > max,
        None => true,
    };
    let write_min = match parse_tracker("minTracker", current_min)? {
        Some(min) => new_sequence < min,
        None => true,
    };

    Ok(TrackerUpdate {
        write_max,
        write_min,
    })
}

fn parse_digits(digits: &str) -> Result<u64> {
    digits
        .parse()
        .map_err(|_| Error::SequenceOverflow(format!("'{}' does not fit in 64 bits", digits)))
}

fn parse_tracker(name: &str, value: &str) -> Result<Option<u64>> {
    let parsed = extract_sequence(value).map_err(|e| match e {
        Error::SequenceOverflow(detail) => Error::SequenceOverflow(format!("{}: {}", name, detail)),
        other => other,
    })?;
    if parsed.is_none() && !value.trim().is_empty() {
        warn!("Malformed {} '{}', treating as absent", name, value.trim());
    }
    Ok(parsed)
}

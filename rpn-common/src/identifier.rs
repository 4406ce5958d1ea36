//! Report number formatting and decomposition
//!
//! A report number has the shape `PATTERN-NNNN-REV`, for example
//! `SJSC-GGNRSP-MOWP-REDA-0388-G00`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trailing `-<digits>-<alphanumeric>` at the end of a report number
static TRAILER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-([0-9]+)-([A-Za-z0-9]+)$").expect("trailer regex is valid")
});

/// Standard revision tag shape: `G` followed by two digits
static STANDARD_REVISION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^G[0-9]{2}$").expect("revision regex is valid"));

/// Default revision tag for a freshly issued report number
pub const DEFAULT_REVISION: &str = "G00";

/// Default zero-pad width of the sequence part
pub const DEFAULT_SEQUENCE_WIDTH: usize = 4;

/// Zero-pad a sequence number to `width` digits
///
/// Padding only extends; a number wider than `width` is kept intact.
///
/// # Examples
///
/// ```
/// use rpn_common::identifier::format_sequence;
///
/// assert_eq!(format_sequence(7, 4), "0007");
/// assert_eq!(format_sequence(12345, 4), "12345");
/// ```
pub fn format_sequence(sequence: u64, width: usize) -> String {
    format!("{:0width$}", sequence, width = width)
}

/// Split the trailing sequence digits and revision tag off a value
///
/// Returns `(prefix, digits, revision)` or `None` if the value does not end
/// in `-<digits>-<alphanumeric>`.
pub(crate) fn split_trailer(value: &str) -> Option<(&str, &str, &str)> {
    let caps = TRAILER.captures(value)?;
    let whole = caps.get(0)?;
    let digits = caps.get(1)?.as_str();
    let revision = caps.get(2)?.as_str();
    Some((&value[..whole.start()], digits, revision))
}

/// Decomposed report number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportNumber {
    /// Full pattern preceding the sequence part
    pub prefix: String,
    /// Sequence number embedded in the identifier
    pub sequence: u64,
    /// Revision tag (normally `G00`)
    pub revision: String,
    /// Zero-pad width used when rendering the sequence
    #[serde(default = "default_width")]
    pub width: usize,
}

fn default_width() -> usize {
    DEFAULT_SEQUENCE_WIDTH
}

impl ReportNumber {
    pub fn new(prefix: impl Into<String>, sequence: u64, revision: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sequence,
            revision: revision.into(),
            width: DEFAULT_SEQUENCE_WIDTH,
        }
    }

    /// Override the zero-pad width
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Padded sequence part, as written to the `partNumber` field
    pub fn part_number(&self) -> String {
        format_sequence(self.sequence, self.width)
    }

    /// Whether the revision tag has the standard `Gnn` shape
    pub fn is_standard_revision(&self) -> bool {
        STANDARD_REVISION.is_match(&self.revision)
    }
}

impl fmt::Display for ReportNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.prefix, self.part_number(), self.revision)
    }
}

impl FromStr for ReportNumber {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let value = s.trim();
        let (prefix, digits, revision) = split_trailer(value).ok_or_else(|| {
            crate::Error::InvalidInput(format!("Not a report number: {}", value))
        })?;
        let sequence = digits.parse::<u64>().map_err(|_| {
            crate::Error::SequenceOverflow(format!("'{}' does not fit in 64 bits", digits))
        })?;

        Ok(Self {
            prefix: prefix.to_string(),
            sequence,
            revision: revision.to_string(),
            width: digits.len(),
        })
    }
}

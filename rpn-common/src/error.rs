//! Common error types for RPN
//!
//! Two families live here:
//! - [`Error`]: infrastructure failures (config, I/O, serialization)
//! - [`Rejection`]: outcomes of an assignment attempt that did not produce
//!   a report number

use crate::fields::Field;
use thiserror::Error;

/// Common result type for RPN operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across RPN crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON record (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sequence digits or arithmetic beyond the supported range
    #[error("Sequence overflow: {0}")]
    SequenceOverflow(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why an assignment attempt ended without writing a report number
///
/// `MalformedTracker` and `PersistenceWarning` never abort an attempt and so
/// are not represented here; they are logged and published as events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The record already carries a report number
    #[error("Report number already assigned")]
    AlreadyAssigned,

    /// A required categorical field is empty
    #[error("Required field '{}' is empty", .0.name())]
    MissingField(Field),

    /// Any other fault during pattern, sequence or write steps
    #[error("Report number generation failed: {0}")]
    UnexpectedFailure(String),
}

impl Rejection {
    /// Whether this rejection should be shown to the user
    ///
    /// Only the two gate rejections are surfaced, and only for interactive
    /// attempts. Unexpected failures go to the failure log and event instead.
    pub fn is_user_facing(&self, interactive: bool) -> bool {
        match self {
            Rejection::AlreadyAssigned | Rejection::MissingField(_) => interactive,
            Rejection::UnexpectedFailure(_) => false,
        }
    }
}

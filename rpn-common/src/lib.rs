//! # RPN Common Library
//!
//! Report number generation for form-driven document records:
//! - Field names and the field-store contract hosts implement
//! - Pattern composition from categorical fields
//! - Sequence tracking against min/max tracker fields
//! - Single-assignment report number issuance
//! - Debounced, single-flight trigger scheduling
//! - Event types, configuration loading, JSON record storage

pub mod assigner;
pub mod config;
pub mod error;
pub mod events;
pub mod fields;
pub mod host;
pub mod identifier;
pub mod pattern;
pub mod record;
pub mod scheduler;
pub mod sequence;
pub mod timer;

pub use assigner::{AssignOptions, Assignment, IdentifierAssigner, Persistence};
pub use config::RpnConfig;
pub use error::{Error, Rejection, Result};
pub use events::{EventBus, RpnEvent, TriggerMode};
pub use fields::{Field, FieldStore, MemoryFieldStore};
pub use identifier::ReportNumber;
pub use scheduler::{AssignmentState, AttemptOutcome, TriggerScheduler};

//! rpn-gen - command-line front end for report number generation
//!
//! One-shot commands operate on a JSON record file; `session` keeps a record
//! open and drives the debounced scheduler from stdin.

pub mod commands;
pub mod session;

pub use commands::{describe_outcome, generate, inspect, next, InspectReport, NextReport};
pub use session::{run_session, SessionCommand};

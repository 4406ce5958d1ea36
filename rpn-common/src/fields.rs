//! Record field names and the field-store contract
//!
//! The generator never owns record storage. It reads and writes named fields
//! through [`FieldStore`], which host adapters implement over whatever
//! backs the record (a form, a document, a database row, a JSON file).
//! Probing of heterogeneous host controls belongs in those adapters.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Named field on a record
///
/// The string names are a fixed contract shared with every host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    // Categorical inputs
    Constant,
    Location,
    Contractor,
    Process,
    Subprocess,
    MainGroup,
    TimePeriod,
    Subject,
    Date,

    // Trackers
    MaxTracker,
    MinTracker,
    DefaultSeed,

    // Outputs
    Pattern,
    PartNumber,
    Identifier,
    Revision,
}

impl Field {
    /// Every field, in contract order
    pub const ALL: [Field; 16] = [
        Field::Constant,
        Field::Location,
        Field::Contractor,
        Field::Process,
        Field::Subprocess,
        Field::MainGroup,
        Field::TimePeriod,
        Field::Subject,
        Field::Date,
        Field::MaxTracker,
        Field::MinTracker,
        Field::DefaultSeed,
        Field::Pattern,
        Field::PartNumber,
        Field::Identifier,
        Field::Revision,
    ];

    /// Fields that must be non-empty before a report number is issued,
    /// in the order they are checked. The first empty one is reported.
    pub const REQUIRED: [Field; 8] = [
        Field::Process,
        Field::Subprocess,
        Field::MainGroup,
        Field::TimePeriod,
        Field::Subject,
        Field::Location,
        Field::Contractor,
        Field::Date,
    ];

    /// Contract name of the field
    pub fn name(self) -> &'static str {
        match self {
            Field::Constant => "constant",
            Field::Location => "location",
            Field::Contractor => "contractor",
            Field::Process => "process",
            Field::Subprocess => "subprocess",
            Field::MainGroup => "mainGroup",
            Field::TimePeriod => "timePeriod",
            Field::Subject => "subject",
            Field::Date => "date",
            Field::MaxTracker => "maxTracker",
            Field::MinTracker => "minTracker",
            Field::DefaultSeed => "defaultSeed",
            Field::Pattern => "pattern",
            Field::PartNumber => "partNumber",
            Field::Identifier => "identifier",
            Field::Revision => "revision",
        }
    }

    /// Whether a change to this field should schedule a background attempt
    ///
    /// Only the categorical inputs are tracked; trackers and outputs are
    /// written by the generator itself.
    pub fn is_tracked_input(self) -> bool {
        matches!(
            self,
            Field::Constant
                | Field::Location
                | Field::Contractor
                | Field::Process
                | Field::Subprocess
                | Field::MainGroup
                | Field::TimePeriod
                | Field::Subject
                | Field::Date
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("Unknown field: {}", s)))
    }
}

/// Key/value access to the fields of the current record
///
/// Implementations normalize whatever the host exposes to this shape.
pub trait FieldStore {
    /// Current value, trimmed; empty string if absent or unreadable
    fn read(&self, field: Field) -> String;

    /// Set a value; returns whether the write took effect
    fn write(&mut self, field: Field, value: &str) -> bool;

    /// Enable or disable editing of a field
    ///
    /// Hosts without edit control ignore this.
    fn set_editable(&mut self, _field: Field, _editable: bool) {}

    /// Whether [`FieldStore::save`] does anything for this host
    fn can_save(&self) -> bool {
        false
    }

    /// Persist the record
    fn save(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory record
///
/// Writes to a field made non-editable are refused, which is how a locked
/// report number stays locked.
#[derive(Debug, Clone, Default)]
pub struct MemoryFieldStore {
    values: HashMap<Field, String>,
    read_only: HashSet<Field>,
}

impl MemoryFieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter, for seeding a record
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    /// Whether the field currently accepts writes
    pub fn is_editable(&self, field: Field) -> bool {
        !self.read_only.contains(&field)
    }

    /// Snapshot of all non-empty values keyed by contract name
    pub fn to_map(&self) -> HashMap<String, String> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.name().to_string(), v.clone()))
            .collect()
    }
}

impl FieldStore for MemoryFieldStore {
    fn read(&self, field: Field) -> String {
        self.values
            .get(&field)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    fn write(&mut self, field: Field, value: &str) -> bool {
        if self.read_only.contains(&field) {
            return false;
        }
        self.values.insert(field, value.to_string());
        true
    }

    fn set_editable(&mut self, field: Field, editable: bool) {
        if editable {
            self.read_only.remove(&field);
        } else {
            self.read_only.insert(field);
        }
    }
}

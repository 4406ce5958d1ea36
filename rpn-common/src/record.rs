//! JSON-file record store
//!
//! A record file is a JSON object of field name to string value, plus an
//! optional `readOnly` array naming locked fields:
//!
//! ```json
//! {
//!   "constant": "SJSC-",
//!   "location": "GGN",
//!   "identifier": "SJSC-GGNRSP-MOWP-REDA-0388-G00",
//!   "readOnly": ["identifier"]
//! }
//! ```
//!
//! Keys that are not field names are kept and written back unchanged.
//! Saving writes a temp file next to the target and renames it over.

use crate::fields::{Field, FieldStore};
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const READ_ONLY_KEY: &str = "readOnly";

/// Record backed by a JSON file
#[derive(Debug, Clone)]
pub struct JsonRecordStore {
    path: PathBuf,
    object: Map<String, Value>,
    read_only: BTreeSet<Field>,
}

impl JsonRecordStore {
    /// Load a record; a missing file yields an empty record
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            info!("Record {} does not exist, starting empty", path.display());
            return Ok(Self {
                path,
                object: Map::new(),
                read_only: BTreeSet::new(),
            });
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_json(path, &content)
    }

    /// Parse a record from JSON text, to be saved at `path`
    pub fn from_json(path: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let path = path.into();
        let mut object = match serde_json::from_str::<Value>(content)? {
            Value::Object(object) => object,
            other => {
                return Err(Error::InvalidInput(format!(
                    "Record {} must be a JSON object, found {}",
                    path.display(),
                    json_kind(&other)
                )))
            }
        };

        let mut read_only = BTreeSet::new();
        if let Some(value) = object.remove(READ_ONLY_KEY) {
            let names: Vec<String> = serde_json::from_value(value)?;
            for name in names {
                read_only.insert(name.parse::<Field>()?);
            }
        }

        debug!("Loaded record {} ({} keys)", path.display(), object.len());
        Ok(Self {
            path,
            object,
            read_only,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the field currently accepts writes
    pub fn is_editable(&self, field: Field) -> bool {
        !self.read_only.contains(&field)
    }

    /// Serialize the record, including the `readOnly` list
    pub fn to_json(&self) -> Result<String> {
        let mut object = self.object.clone();
        if !self.read_only.is_empty() {
            let names: Vec<Value> = self
                .read_only
                .iter()
                .map(|field| Value::String(field.name().to_string()))
                .collect();
            object.insert(READ_ONLY_KEY.to_string(), Value::Array(names));
        }
        Ok(serde_json::to_string_pretty(&Value::Object(object))?)
    }
}

impl FieldStore for JsonRecordStore {
    fn read(&self, field: Field) -> String {
        match self.object.get(field.name()) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    fn write(&mut self, field: Field, value: &str) -> bool {
        if self.read_only.contains(&field) {
            return false;
        }
        self.object
            .insert(field.name().to_string(), Value::String(value.to_string()));
        true
    }

    fn set_editable(&mut self, field: Field, editable: bool) {
        if editable {
            self.read_only.remove(&field);
        } else {
            self.read_only.insert(field);
        }
    }

    fn can_save(&self) -> bool {
        true
    }

    fn save(&mut self) -> Result<()> {
        let content = self.to_json()?;
        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let written = std::fs::write(&temp_path, content)
            .and_then(|()| std::fs::rename(&temp_path, &self.path));
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_file(&temp_path) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not remove {}: {}", temp_path.display(), cleanup);
                }
            }
            return Err(e.into());
        }
        debug!("Saved record {}", self.path.display());
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

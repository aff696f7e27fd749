//! Interfaces to systems outside the pipeline.
//!
//! The router looks up plant care records for species results and hands every
//! disease result to a sink. Both are optional; the in-process
//! implementations here cover files and tests.

use super::prediction::Prediction;
use crate::core::errors::{PipelineError, PipelineResult};
use crate::utils::normalize_label;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Source of plant care records.
pub trait CareCatalog: Send + Sync {
    /// Returns the care record for a label, if one exists.
    fn find_by_label(&self, label: &str) -> Option<Value>;
}

/// Care records loaded from a JSON file.
///
/// The file is either an object keyed by label or an array of records that
/// carry a `label` (and optionally `label_localized`) field.
#[derive(Debug, Clone, Default)]
pub struct JsonCareCatalog {
    records: HashMap<String, Value>,
}

impl JsonCareCatalog {
    /// Loads a catalog file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let raw: Value = serde_json::from_str(&content)?;
        Self::from_value(raw).map_err(|message| {
            PipelineError::invalid_config("io.care_catalog", format!("{}: {message}", path.display()))
        })
    }

    /// Builds a catalog from parsed JSON.
    pub fn from_value(raw: Value) -> Result<Self, String> {
        let mut records = HashMap::new();
        match raw {
            Value::Object(map) => {
                for (label, record) in map {
                    records.insert(normalize_label(&label), record);
                }
            }
            Value::Array(items) => {
                for (i, record) in items.into_iter().enumerate() {
                    let keys: Vec<String> = ["label", "label_localized"]
                        .iter()
                        .filter_map(|k| record.get(*k).and_then(Value::as_str))
                        .map(normalize_label)
                        .collect();
                    if keys.is_empty() {
                        return Err(format!("record {i} has no 'label' field"));
                    }
                    for key in keys {
                        records.insert(key, record.clone());
                    }
                }
            }
            _ => return Err("expected a JSON object or array".to_string()),
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CareCatalog for JsonCareCatalog {
    fn find_by_label(&self, label: &str) -> Option<Value> {
        self.records.get(&normalize_label(label)).cloned()
    }
}

/// A disease result handed to a [`DiagnosisSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub image: PathBuf,
    pub prediction: Prediction,
}

/// Destination for disease diagnoses.
pub trait DiagnosisSink: Send + Sync {
    fn save(&self, record: &DiagnosisRecord) -> PipelineResult<()>;
}

/// Keeps diagnoses in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnosisSink {
    records: Mutex<Vec<DiagnosisRecord>>,
}

impl MemoryDiagnosisSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every record saved so far.
    pub fn records(&self) -> Vec<DiagnosisRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl DiagnosisSink for MemoryDiagnosisSink {
    fn save(&self, record: &DiagnosisRecord) -> PipelineResult<()> {
        self.records
            .lock()
            .map_err(|_| PipelineError::config_error("diagnosis sink lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

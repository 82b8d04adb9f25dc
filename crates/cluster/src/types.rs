//! Worker spec/status types and the label vocabulary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label keys and fixed values stamped on every extraction worker.
/// Labels are the only mechanism used to count, locate, or harvest
/// workers — keep this vocabulary in one place.
pub mod labels {
    pub const APP_KEY: &str = "app";
    pub const APP_VALUE: &str = "churro";
    pub const SERVICE_KEY: &str = "service";
    pub const SERVICE_VALUE: &str = "churro-extract";
    pub const SOURCE_NAME_KEY: &str = "extractsourcename";
    pub const EXTRACT_LOG_KEY: &str = "extractlogid";
}

/// Environment variable names forming the scheduler→worker contract.
/// This set (plus `POD_NAME`, injected by the orchestrator from pod
/// metadata) is the entire interface an extraction worker sees.
pub mod env_keys {
    pub const NAMESPACE: &str = "CHURRO_NAMESPACE";
    pub const PIPELINE: &str = "CHURRO_PIPELINE";
    pub const FILENAME: &str = "CHURRO_FILENAME";
    pub const SCHEME: &str = "CHURRO_SCHEME";
    pub const WATCHDIR_NAME: &str = "CHURRO_WATCHDIR_NAME";
    pub const TABLENAME: &str = "CHURRO_TABLENAME";
    pub const EXTRACT_LOG: &str = "CHURRO_EXTRACTLOG";
}

/// Selector matching every extraction worker of this scheduler's pipeline.
pub fn selector() -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::APP_KEY.to_string(), labels::APP_VALUE.to_string()),
        (labels::SERVICE_KEY.to_string(), labels::SERVICE_VALUE.to_string()),
    ])
}

/// Complete description of a worker to submit. The orchestrator owns
/// the worker's runtime lifecycle once this is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// Unique suffix-qualified name (RFC 1123 label compatible).
    pub name: String,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    /// The full scheduler→worker env contract.
    pub env: BTreeMap<String, String>,
}

/// Coarse pod phase as reported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl WorkerPhase {
    /// Counted against the pipeline's `max_jobs` admission cap.
    pub fn is_active(&self) -> bool {
        matches!(self, WorkerPhase::Running)
    }

    /// Neither running nor pending — eligible for harvest once old enough.
    pub fn is_settled(&self) -> bool {
        !matches!(self, WorkerPhase::Running | WorkerPhase::Pending)
    }
}

/// Observed state of one worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub name: String,
    pub phase: WorkerPhase,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl WorkerStatus {
    /// True when every key/value pair of `selector` appears in the labels.
    pub fn matches(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(k).map(String::as_str) == Some(v.as_str()))
    }
}

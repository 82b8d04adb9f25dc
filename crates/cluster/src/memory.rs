//! In-memory orchestrator double.
//!
//! Used by scheduler tests and by `--cluster memory` local runs, where
//! no real orchestrator exists. Workers start in the *running* phase;
//! tests move them along with [`MemoryCluster::set_phase`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use churro_core::{ChurroError, Result};

use crate::client::ClusterClient;
use crate::types::{WorkerPhase, WorkerSpec, WorkerStatus};

#[derive(Default)]
pub struct MemoryCluster {
    workers: Mutex<BTreeMap<String, WorkerStatus>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a worker to a new phase (test hook / local control).
    pub fn set_phase(&self, name: &str, phase: WorkerPhase) {
        let mut workers = self.workers.lock().expect("workers lock poisoned");
        if let Some(w) = workers.get_mut(name) {
            w.phase = phase;
        }
    }

    /// Backdate a worker's start time (test hook for harvest-age math).
    pub fn set_started_at(&self, name: &str, at: DateTime<Utc>) {
        let mut workers = self.workers.lock().expect("workers lock poisoned");
        if let Some(w) = workers.get_mut(name) {
            w.started_at = Some(at);
        }
    }

    /// Names of all known workers, in insertion-independent order.
    pub fn worker_names(&self) -> Vec<String> {
        let workers = self.workers.lock().expect("workers lock poisoned");
        workers.keys().cloned().collect()
    }
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    async fn create_worker(&self, spec: &WorkerSpec) -> Result<()> {
        let mut workers = self.workers.lock().expect("workers lock poisoned");
        if workers.contains_key(&spec.name) {
            return Err(ChurroError::Cluster(format!(
                "worker {} already exists",
                spec.name
            )));
        }
        info!(worker = %spec.name, "memory cluster: worker created");
        workers.insert(
            spec.name.clone(),
            WorkerStatus {
                name: spec.name.clone(),
                phase: WorkerPhase::Running,
                labels: spec.labels.clone(),
                started_at: Some(Utc::now()),
            },
        );
        Ok(())
    }

    async fn list_workers(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<WorkerStatus>> {
        let workers = self.workers.lock().expect("workers lock poisoned");
        Ok(workers
            .values()
            .filter(|w| w.matches(selector))
            .cloned()
            .collect())
    }

    async fn delete_worker(&self, name: &str) -> Result<()> {
        let mut workers = self.workers.lock().expect("workers lock poisoned");
        match workers.remove(name) {
            Some(_) => Ok(()),
            None => Err(ChurroError::Cluster(format!("worker {} not found", name))),
        }
    }
}

//! The orchestrator client trait.

use std::collections::BTreeMap;

use async_trait::async_trait;

use churro_core::Result;

use crate::types::{WorkerSpec, WorkerStatus};

/// Trait for cluster orchestrator backends.
///
/// Implementations are stateless and safe for concurrent use; every
/// component shares one `Arc<dyn ClusterClient>`. "How many workers are
/// running" is always re-derived through this trait, never cached.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Submit a worker for execution. The orchestrator owns its
    /// lifecycle from here; failures are returned to the caller.
    async fn create_worker(&self, spec: &WorkerSpec) -> Result<()>;

    /// List workers whose labels contain every pair in `selector`.
    async fn list_workers(
        &self,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<WorkerStatus>>;

    /// Delete a worker by name.
    async fn delete_worker(&self, name: &str) -> Result<()>;

    /// Count workers in the *running* phase (pending and terminal pods
    /// do not hold an admission slot).
    async fn count_running(&self, selector: &BTreeMap<String, String>) -> Result<usize> {
        let workers = self.list_workers(selector).await?;
        Ok(workers.iter().filter(|w| w.phase.is_active()).count())
    }
}

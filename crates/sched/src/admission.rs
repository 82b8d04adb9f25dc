//! Admission queue: the single consumer gating worker launches.
//!
//! Admission is checked against *live* orchestrator state, not a local
//! counter — workers fail and get harvested by other actors, and a
//! cached count would drift. The only retry loop in the scheduler is
//! the backpressure path: an entry over the cap sleeps one backoff
//! interval and rejoins the back of the queue, indefinitely, because
//! files must not be silently dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use churro_cluster::types::selector;
use churro_cluster::ClusterClient;
use churro_core::{PipelineProvider, Result};

use crate::launch::{launch_worker, LaunchConfig};
use crate::watch::QueueEntry;

/// Fixed delay before a backpressured entry is re-enqueued.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub backoff: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// What became of one queue entry. Internal; surfaced for tests.
#[derive(Debug, PartialEq, Eq)]
enum Admitted {
    Launched,
    Requeued,
    Dropped,
}

/// Drain the admission queue until every sender is gone.
///
/// `rx` is the consuming end; `tx` is a handle to the same queue used
/// to re-enqueue backpressured entries behind concurrently arriving
/// work.
pub async fn run_admission_loop(
    mut rx: mpsc::Receiver<QueueEntry>,
    tx: mpsc::Sender<QueueEntry>,
    pipeline: Arc<dyn PipelineProvider>,
    cluster: Arc<dyn ClusterClient>,
    launch_cfg: LaunchConfig,
    cfg: AdmissionConfig,
) {
    info!("admission loop started");
    while let Some(entry) = rx.recv().await {
        admit_one(entry, &tx, pipeline.as_ref(), cluster.as_ref(), &launch_cfg, &cfg).await;
    }
    info!("admission queue closed; loop exiting");
}

/// Process one entry: count live workers, then launch or push back.
///
/// Errors never kill the loop — a failed cycle is logged and retried
/// on the next natural trigger (the next queue item), except launch
/// failures after successful admission, which drop the entry.
async fn admit_one(
    entry: QueueEntry,
    tx: &mpsc::Sender<QueueEntry>,
    pipeline: &dyn PipelineProvider,
    cluster: &dyn ClusterClient,
    launch_cfg: &LaunchConfig,
    cfg: &AdmissionConfig,
) -> Admitted {
    match try_admit(&entry, pipeline, cluster, launch_cfg).await {
        Ok(true) => Admitted::Launched,
        Ok(false) => {
            // Over the cap: hold one backoff interval, then rejoin the
            // back of the queue. try_send keeps the consumer from
            // deadlocking against a full queue it is the only drain of.
            warn!(
                file = %entry.path.display(),
                "admission over max_jobs; backing off {:?}",
                cfg.backoff
            );
            tokio::time::sleep(cfg.backoff).await;
            match tx.try_send(entry) {
                Ok(()) => Admitted::Requeued,
                Err(e) => {
                    error!("cannot re-enqueue backpressured entry, dropping: {}", e);
                    Admitted::Dropped
                }
            }
        }
        Err(e) => {
            error!(file = %entry.path.display(), "admission failed, entry dropped: {}", e);
            Admitted::Dropped
        }
    }
}

/// Returns Ok(true) on launch, Ok(false) on backpressure.
async fn try_admit(
    entry: &QueueEntry,
    pipeline: &dyn PipelineProvider,
    cluster: &dyn ClusterClient,
    launch_cfg: &LaunchConfig,
) -> Result<bool> {
    // Authoritative state, re-fetched every decision.
    let pipeline = pipeline.fetch().await?;
    let running = cluster.count_running(&selector()).await?;
    if running >= pipeline.effective_max_jobs() {
        return Ok(false);
    }

    let source = pipeline.source_for_dir(&entry.dir).ok_or_else(|| {
        churro_core::ChurroError::Pipeline(format!(
            "no source configured for directory {}",
            entry.dir.display()
        ))
    })?;

    launch_worker(
        cluster,
        launch_cfg,
        source.scheme,
        &entry.path.display().to_string(),
        &source.tablename,
        &source.name,
    )
    .await?;
    Ok(true)
}

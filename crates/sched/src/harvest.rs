//! Harvester: periodic garbage collection of settled workers.
//!
//! Pure sweep, no state mutation: it lists by label and deletes what
//! is both settled and past the pipeline's maximum age. Running and
//! pending pods are never touched regardless of age — this reclaims
//! finished-but-not-cleaned-up workers, it is not a kill switch.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use churro_cluster::types::selector;
use churro_cluster::{ClusterClient, WorkerStatus};
use churro_core::schedule::parse_cron;
use churro_core::PipelineProvider;

/// Fallback tick interval when the pipeline's schedule cannot be used.
const FALLBACK_TICK: Duration = Duration::from_secs(20);

/// Names of the workers due for deletion at `now`.
///
/// A worker is due when its phase is settled AND its observed start
/// time is older than `max_age`. A settled worker without a start time
/// is kept: there is no age evidence to delete on.
pub fn sweep(workers: &[WorkerStatus], now: chrono::DateTime<Utc>, max_age: chrono::Duration) -> Vec<String> {
    workers
        .iter()
        .filter(|w| w.phase.is_settled())
        .filter(|w| match w.started_at {
            Some(started) => now.signed_duration_since(started) > max_age,
            None => false,
        })
        .map(|w| w.name.clone())
        .collect()
}

/// Run harvest sweeps on the pipeline's cron schedule, forever.
///
/// The pipeline document is re-fetched each cycle so max-age and
/// schedule changes take effect on the next tick. Per-cycle failures
/// are logged and retried on the next natural tick.
pub async fn run_harvester(pipeline: Arc<dyn PipelineProvider>, cluster: Arc<dyn ClusterClient>) {
    info!("harvester started");
    loop {
        // The schedule read here only times the next tick; on failure
        // wait out one fallback interval rather than spinning.
        let wait = match pipeline.fetch().await {
            Ok(p) => match parse_cron(p.effective_harvest_frequency()) {
                Ok(schedule) => schedule
                    .upcoming(Utc)
                    .next()
                    .and_then(|next| next.signed_duration_since(Utc::now()).to_std().ok())
                    .unwrap_or(FALLBACK_TICK),
                Err(e) => {
                    error!("invalid harvest_frequency, using fallback: {}", e);
                    FALLBACK_TICK
                }
            },
            Err(e) => {
                error!("harvester cannot fetch pipeline: {}", e);
                FALLBACK_TICK
            }
        };
        tokio::time::sleep(wait).await;

        if let Err(e) = harvest_cycle(pipeline.as_ref(), cluster.as_ref()).await {
            error!("harvest sweep skipped: {}", e);
        }
    }
}

/// One sweep: re-fetch the pipeline so max-age changes made while the
/// harvester slept apply to this very cycle, list by label, delete the
/// due workers. Per-worker delete errors do not abort the sweep; the
/// next tick retries.
async fn harvest_cycle(
    pipeline: &dyn PipelineProvider,
    cluster: &dyn ClusterClient,
) -> churro_core::Result<()> {
    let current = pipeline.fetch().await?;
    let workers = cluster.list_workers(&selector()).await?;

    let due = sweep(&workers, Utc::now(), current.effective_harvest_pod_duration());
    if due.is_empty() {
        debug!(workers = workers.len(), "harvest sweep: nothing due");
        return Ok(());
    }

    for name in due {
        match cluster.delete_worker(&name).await {
            Ok(()) => info!(worker = %name, "harvested settled worker"),
            Err(e) => error!(worker = %name, "harvest delete failed: {}", e),
        }
    }
    Ok(())
}

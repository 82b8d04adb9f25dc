//! Lifecycle of API-style sources: exactly one long-lived polling
//! worker per source, started and stopped explicitly. Bypasses the
//! watcher and the admission queue entirely.

use std::collections::BTreeMap;

use tracing::info;

use churro_cluster::types::labels;
use churro_cluster::ClusterClient;
use churro_core::{ChurroError, Pipeline, Result};

use crate::launch::{launch_worker, Launched, LaunchConfig};

/// Launch the single polling worker for an API-style source.
pub async fn start_api_source(
    cluster: &dyn ClusterClient,
    launch_cfg: &LaunchConfig,
    pipeline: &Pipeline,
    source_id: &str,
) -> Result<Launched> {
    let source = pipeline.source_by_id(source_id).ok_or_else(|| {
        ChurroError::InvalidSource(format!(
            "source '{}' not found in pipeline '{}'",
            source_id, pipeline.name
        ))
    })?;
    if !source.scheme.is_api() {
        return Err(ChurroError::InvalidSource(format!(
            "source '{}' has scheme {}, expected api",
            source.name, source.scheme
        )));
    }

    // The poll URL rides in the file-path slot of the worker contract.
    launch_worker(
        cluster,
        launch_cfg,
        source.scheme,
        &source.path,
        &source.tablename,
        &source.name,
    )
    .await
}

/// Stop the polling worker for an API-style source.
///
/// Zero matching pods is a successful no-op (returns false). More than
/// one matching pod means the one-worker-per-source invariant is
/// already broken; that is reported, never silently resolved.
pub async fn stop_api_source(cluster: &dyn ClusterClient, source_name: &str) -> Result<bool> {
    let by_source = BTreeMap::from([(
        labels::SOURCE_NAME_KEY.to_string(),
        source_name.to_string(),
    )]);
    let workers = cluster.list_workers(&by_source).await?;

    match workers.as_slice() {
        [] => Ok(false),
        [only] => {
            cluster.delete_worker(&only.name).await?;
            info!(source = %source_name, worker = %only.name, "api source stopped");
            Ok(true)
        }
        many => Err(ChurroError::Cluster(format!(
            "expected at most one worker for source '{}', found {}",
            source_name,
            many.len()
        ))),
    }
}

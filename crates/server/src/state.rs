//! Shared state handed to every control-surface handler.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use churro_cluster::ClusterClient;
use churro_core::{Config, PipelineProvider};
use churro_sched::{LaunchConfig, QueueEntry, WatchRegistry};

pub struct AppState {
    pub config: Config,
    pub cluster: Arc<dyn ClusterClient>,
    pub pipeline: Arc<dyn PipelineProvider>,
    /// Producer side of the admission queue, used by the upload paths
    /// only indirectly: uploads publish files for the watcher, which
    /// owns the "ready to extract" decision. Kept here for the
    /// watcher arms spawned by CreateExtractSource.
    pub queue_tx: mpsc::Sender<QueueEntry>,
    pub watches: Arc<WatchRegistry>,
    /// Shared outbound client for URL uploads; reqwest pools
    /// connections per client, so one instance serves all requests.
    pub http: reqwest::Client,
    pub started: Instant,
}

impl AppState {
    pub fn launch_cfg(&self) -> LaunchConfig {
        LaunchConfig {
            namespace: self.config.namespace.clone(),
            pipeline_name: self.config.pipeline_name.clone(),
            image: self.config.worker_image.clone(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

//! churro-scheduler — the extraction job scheduler process.
//!
//! Wires together the four scheduler pieces and the control surface:
//! one watch task per drop-style source, the admission loop, the
//! harvester, and the HTTP API.

mod api;
mod router;
mod state;
mod upload;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use churro_cluster::{ClusterClient, HttpClusterClient, MemoryCluster};
use churro_core::{Config, PipelineProvider, YamlPipelineProvider};
use churro_sched::{
    arm_watch, run_admission_loop, run_harvester, AdmissionConfig, QueueEntry, WatchRegistry,
};

use crate::state::AppState;

/// Capacity of the in-process admission queue.
const QUEUE_CAPACITY: usize = 64;

// ── CLI ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClusterBackend {
    /// Orchestrator REST API (production).
    Http,
    /// In-process cluster double (local development).
    Memory,
}

/// churro extraction job scheduler.
#[derive(Parser, Debug)]
#[command(name = "churro-scheduler", version, about)]
struct Cli {
    /// Cluster backend to launch workers against.
    #[arg(long, env = "CHURRO_CLUSTER_BACKEND", value_enum, default_value_t = ClusterBackend::Http)]
    cluster: ClusterBackend,

    /// Listen address override (host:port).
    #[arg(long)]
    listen: Option<String>,

    /// Pipeline configuration document override.
    #[arg(long)]
    pipeline_config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    churro_core::config::load_dotenv();
    let mut config = Config::from_env().context("scheduler configuration")?;
    if let Some(listen) = &cli.listen {
        let (host, port) = listen
            .rsplit_once(':')
            .context("--listen expects host:port")?;
        config.server.host = host.to_string();
        config.server.port = port.parse().context("--listen port")?;
    }
    if let Some(path) = cli.pipeline_config {
        config.pipeline_config = path;
    }
    config.log_summary();

    let cluster: Arc<dyn ClusterClient> = match cli.cluster {
        ClusterBackend::Http => Arc::new(HttpClusterClient::new(
            &config.cluster,
            &config.namespace,
            config.certs.clone(),
        )),
        ClusterBackend::Memory => {
            warn!("using in-memory cluster backend; workers will not actually run");
            Arc::new(MemoryCluster::new())
        }
    };

    let pipeline: Arc<dyn PipelineProvider> =
        Arc::new(YamlPipelineProvider::new(config.pipeline_config.clone()));

    let (queue_tx, queue_rx) = mpsc::channel::<QueueEntry>(QUEUE_CAPACITY);
    let watches = Arc::new(WatchRegistry::new());

    let state = Arc::new(AppState {
        config: config.clone(),
        cluster: cluster.clone(),
        pipeline: pipeline.clone(),
        queue_tx: queue_tx.clone(),
        watches: watches.clone(),
        http: reqwest::Client::new(),
        started: Instant::now(),
    });

    // Arm watches for every configured drop-style source. Sources that
    // fail to arm are skipped; CreateExtractSource can re-arm later.
    match pipeline.fetch().await {
        Ok(p) => {
            for source in p.sources.values().filter(|s| !s.scheme.is_api()) {
                match arm_watch(source, queue_tx.clone(), &watches) {
                    Ok(true) => info!(source = %source.name, dir = %source.path, "watch armed"),
                    Ok(false) => {}
                    Err(e) => error!(source = %source.name, "cannot arm watch: {}", e),
                }
            }
        }
        Err(e) => error!("initial pipeline fetch failed, no watches armed: {}", e),
    }

    tokio::spawn(run_admission_loop(
        queue_rx,
        queue_tx,
        pipeline.clone(),
        cluster.clone(),
        state.launch_cfg(),
        AdmissionConfig::default(),
    ));
    tokio::spawn(run_harvester(pipeline, cluster));

    let app = router::build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    info!("control surface listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

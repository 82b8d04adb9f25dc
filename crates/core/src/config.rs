use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ChurroError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a required env var, failing with a configuration error naming the key.
fn env_required(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| ChurroError::Config(format!("required env var {} is not set", key)))
}

// ── Top-level config ──────────────────────────────────────────

/// Scheduler process configuration, read once at startup.
///
/// Missing required keys are fatal: the process must not come up
/// half-configured and then fail on the first launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster namespace the scheduler and its workers live in.
    pub namespace: String,
    /// Name of the pipeline this scheduler instance serves.
    pub pipeline_name: String,
    /// Path to the pipeline configuration document (YAML, mounted read-only).
    pub pipeline_config: PathBuf,
    /// Container image for extraction workers.
    pub worker_image: String,
    pub cluster: ClusterConfig,
    pub server: ServerConfig,
    pub certs: CertConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            namespace: env_required("CHURRO_NS")?,
            pipeline_name: env_required("CHURRO_PIPELINE")?,
            pipeline_config: PathBuf::from(env_required("CHURRO_PIPELINE_CONFIG")?),
            worker_image: env_required("CHURRO_WORKER_IMAGE")?,
            cluster: ClusterConfig::from_env(),
            server: ServerConfig::from_env(),
            certs: CertConfig::from_env()?,
        })
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  namespace:       {}", self.namespace);
        tracing::info!("  pipeline:        {}", self.pipeline_name);
        tracing::info!("  pipeline config: {}", self.pipeline_config.display());
        tracing::info!("  worker image:    {}", self.worker_image);
        tracing::info!("  cluster api:     {}", self.cluster.base_url);
        tracing::info!("  listen:          {}:{}", self.server.host, self.server.port);
    }
}

// ── Cluster API ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Base URL of the orchestrator REST API.
    pub base_url: String,
    /// Optional path to a mounted bearer-token file.
    pub token_file: Option<PathBuf>,
}

impl ClusterConfig {
    fn from_env() -> Self {
        Self {
            base_url: env_or("CHURRO_CLUSTER_URL", "http://localhost:8001"),
            token_file: env_opt("CHURRO_CLUSTER_TOKEN_FILE").map(PathBuf::from),
        }
    }
}

// ── Control surface ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("CHURRO_HOST", "0.0.0.0"),
            port: env_or("CHURRO_PORT", "8080").parse().unwrap_or(8080),
        }
    }
}

// ── Worker credential mounts ──────────────────────────────────

/// Mount points for the database and service certificates every
/// extraction worker needs. Required: a worker launched without them
/// cannot reach storage, so refusing to start is the cheaper failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertConfig {
    pub db_cert_path: PathBuf,
    pub service_cert_path: PathBuf,
}

impl CertConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            db_cert_path: PathBuf::from(env_required("CHURRO_DB_CERT_PATH")?),
            service_cert_path: PathBuf::from(env_required("CHURRO_SERVICE_CERT_PATH")?),
        })
    }
}

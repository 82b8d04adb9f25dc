//! Worker launcher: one matched file (or one API source) → one worker spec.

use std::collections::BTreeMap;

use tracing::info;
use uuid::Uuid;

use churro_cluster::types::{env_keys, labels, selector};
use churro_cluster::{ClusterClient, WorkerSpec};
use churro_core::{Result, Scheme};

/// Static launch parameters shared by every worker of this scheduler.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub namespace: String,
    pub pipeline_name: String,
    pub image: String,
}

/// Outcome of a launch: the identifiers the caller may want to log.
#[derive(Debug, Clone)]
pub struct Launched {
    pub worker_name: String,
    /// Correlation id linking the worker pod to its job-log record.
    pub extract_log_id: String,
}

/// Synthesize a unique, RFC 1123-compatible worker name.
fn worker_name(pipeline: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-extract-{}", pipeline, &suffix[..8])
}

/// Build the worker spec for one launch.
///
/// The env map is the *entire* contract the worker needs; labels are
/// the only mechanism later used to count, locate, or harvest it.
fn build_spec(
    cfg: &LaunchConfig,
    scheme: Scheme,
    file_path: &str,
    tablename: &str,
    source_name: &str,
) -> WorkerSpec {
    // Exhaustive over the closed scheme set: adding a variant is a
    // compile error here until the launcher handles it.
    match scheme {
        Scheme::Csv
        | Scheme::Xml
        | Scheme::Json
        | Scheme::Jsonpath
        | Scheme::Spreadsheet
        | Scheme::Api
        | Scheme::HttpPost => {}
    }

    let name = worker_name(&cfg.pipeline_name);
    let extract_log_id = Uuid::new_v4().to_string();

    let mut worker_labels = selector();
    worker_labels.insert(labels::SOURCE_NAME_KEY.to_string(), source_name.to_string());
    worker_labels.insert(labels::EXTRACT_LOG_KEY.to_string(), extract_log_id.clone());

    let env = BTreeMap::from([
        (env_keys::NAMESPACE.to_string(), cfg.namespace.clone()),
        (env_keys::PIPELINE.to_string(), cfg.pipeline_name.clone()),
        (env_keys::FILENAME.to_string(), file_path.to_string()),
        (env_keys::SCHEME.to_string(), scheme.to_string()),
        (env_keys::WATCHDIR_NAME.to_string(), source_name.to_string()),
        (env_keys::TABLENAME.to_string(), tablename.to_string()),
        (env_keys::EXTRACT_LOG.to_string(), extract_log_id),
    ]);

    WorkerSpec {
        name,
        image: cfg.image.clone(),
        labels: worker_labels,
        env,
    }
}

/// Build and submit one extraction worker. Submission errors propagate
/// to the caller; nothing here retries.
pub async fn launch_worker(
    cluster: &dyn ClusterClient,
    cfg: &LaunchConfig,
    scheme: Scheme,
    file_path: &str,
    tablename: &str,
    source_name: &str,
) -> Result<Launched> {
    let spec = build_spec(cfg, scheme, file_path, tablename, source_name);
    let name = spec.name.clone();
    let extract_log_id = spec.labels[labels::EXTRACT_LOG_KEY].clone();

    cluster.create_worker(&spec).await?;
    info!(
        worker = %name,
        extractlogid = %extract_log_id,
        scheme = %scheme,
        file = %file_path,
        "worker launched"
    );

    Ok(Launched {
        worker_name: name,
        extract_log_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use churro_cluster::MemoryCluster;

    fn cfg() -> LaunchConfig {
        LaunchConfig {
            namespace: "pipelines".into(),
            pipeline_name: "sales".into(),
            image: "churro-extract:latest".into(),
        }
    }

    #[test]
    fn worker_names_are_unique_and_prefixed() {
        let a = worker_name("sales");
        let b = worker_name("sales");
        assert!(a.starts_with("sales-extract-"));
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn spec_carries_the_full_env_contract() {
        let spec = build_spec(&cfg(), Scheme::Csv, "/data/csv/a.csv", "sales", "csvfiles");
        let env = &spec.env;
        assert_eq!(env[env_keys::NAMESPACE], "pipelines");
        assert_eq!(env[env_keys::PIPELINE], "sales");
        assert_eq!(env[env_keys::FILENAME], "/data/csv/a.csv");
        assert_eq!(env[env_keys::SCHEME], "csv");
        assert_eq!(env[env_keys::WATCHDIR_NAME], "csvfiles");
        assert_eq!(env[env_keys::TABLENAME], "sales");
        assert_eq!(env[env_keys::EXTRACT_LOG], spec.labels[labels::EXTRACT_LOG_KEY]);
        // Nothing beyond the contract leaks into the worker.
        assert_eq!(env.len(), 7);
    }

    #[tokio::test]
    async fn launch_sets_labels_used_for_counting_and_harvest() {
        let cluster = MemoryCluster::new();
        let launched = launch_worker(
            &cluster,
            &cfg(),
            Scheme::Csv,
            "/data/csv/a.csv",
            "sales",
            "csvfiles",
        )
        .await
        .unwrap();

        let workers = cluster.list_workers(&selector()).await.unwrap();
        assert_eq!(workers.len(), 1);
        let w = &workers[0];
        assert_eq!(w.name, launched.worker_name);
        assert_eq!(
            w.labels.get(labels::SOURCE_NAME_KEY).map(String::as_str),
            Some("csvfiles")
        );
        assert_eq!(
            w.labels.get(labels::EXTRACT_LOG_KEY).map(String::as_str),
            Some(launched.extract_log_id.as_str())
        );
    }

    #[tokio::test]
    async fn each_launch_gets_a_fresh_correlation_id() {
        let cluster = MemoryCluster::new();
        let a = launch_worker(&cluster, &cfg(), Scheme::Json, "/d/a.json", "t", "s")
            .await
            .unwrap();
        let b = launch_worker(&cluster, &cfg(), Scheme::Json, "/d/b.json", "t", "s")
            .await
            .unwrap();
        assert_ne!(a.extract_log_id, b.extract_log_id);
    }
}

//! End-to-end admission behavior against the in-memory cluster:
//! three files arrive at once with a two-worker cap; two launch
//! immediately, the third waits out backpressure until a slot frees.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use churro_cluster::types::selector;
use churro_cluster::{ClusterClient, MemoryCluster, WorkerPhase};
use churro_core::{PipelineProvider, YamlPipelineProvider};
use churro_sched::{run_admission_loop, AdmissionConfig, LaunchConfig, QueueEntry};

fn pipeline_doc(dir: &std::path::Path, max_jobs: usize) -> String {
    format!(
        r#"
name: sales
namespace: pipelines
max_jobs: {max_jobs}
sources:
  src1:
    id: src1
    name: csvfiles
    path: {dir}
    scheme: csv
    regex: ".*\\.csv$"
    tablename: sales
"#,
        max_jobs = max_jobs,
        dir = dir.display(),
    )
}

fn entry(dir: &std::path::Path, name: &str) -> QueueEntry {
    QueueEntry {
        path: dir.join(name),
        dir: dir.to_path_buf(),
        regex: r".*\.csv$".into(),
    }
}

async fn wait_for<F>(mut check: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    check()
}

#[tokio::test]
async fn flood_respects_max_jobs_and_drains_after_a_slot_frees() {
    let tmp = tempfile::tempdir().unwrap();
    let watch_dir = tmp.path().join("csv");
    std::fs::create_dir_all(&watch_dir).unwrap();
    let config_path = tmp.path().join("pipeline.yaml");
    std::fs::write(&config_path, pipeline_doc(&watch_dir, 2)).unwrap();

    let cluster = Arc::new(MemoryCluster::new());
    let provider: Arc<dyn PipelineProvider> =
        Arc::new(YamlPipelineProvider::new(config_path.clone()));
    let (tx, rx) = mpsc::channel::<QueueEntry>(16);

    let launch_cfg = LaunchConfig {
        namespace: "pipelines".into(),
        pipeline_name: "sales".into(),
        image: "churro-extract:latest".into(),
    };
    let loop_cluster: Arc<dyn ClusterClient> = cluster.clone();
    tokio::spawn(run_admission_loop(
        rx,
        tx.clone(),
        provider,
        loop_cluster,
        launch_cfg,
        AdmissionConfig {
            backoff: Duration::from_millis(50),
        },
    ));

    // Three well-formed files arrive within one second.
    for name in ["a.csv", "b.csv", "c.csv"] {
        tx.send(entry(&watch_dir, name)).await.unwrap();
    }

    // Two workers launch promptly.
    let c = cluster.clone();
    assert!(
        wait_for(move || c.worker_names().len() == 2, Duration::from_secs(2)).await,
        "first two launches did not happen"
    );

    // The third stays backpressured: sample the running count for a
    // few backoff intervals and require it never exceeds the cap.
    for _ in 0..20 {
        let running = cluster.count_running(&selector()).await.unwrap();
        assert!(running <= 2, "admission cap exceeded: {} running", running);
        assert_eq!(cluster.worker_names().len(), 2);
        sleep(Duration::from_millis(10)).await;
    }

    // One worker leaves the running set; the held entry launches.
    let first = cluster.worker_names()[0].clone();
    cluster.set_phase(&first, WorkerPhase::Succeeded);

    let c = cluster.clone();
    assert!(
        wait_for(move || c.worker_names().len() == 3, Duration::from_secs(2)).await,
        "backpressured entry was never admitted"
    );
    assert!(cluster.count_running(&selector()).await.unwrap() <= 2);
}

#[tokio::test]
async fn max_jobs_change_in_the_document_applies_next_decision() {
    let tmp = tempfile::tempdir().unwrap();
    let watch_dir = tmp.path().join("csv");
    std::fs::create_dir_all(&watch_dir).unwrap();
    let config_path = tmp.path().join("pipeline.yaml");
    std::fs::write(&config_path, pipeline_doc(&watch_dir, 1)).unwrap();

    let cluster = Arc::new(MemoryCluster::new());
    let provider: Arc<dyn PipelineProvider> =
        Arc::new(YamlPipelineProvider::new(config_path.clone()));
    let (tx, rx) = mpsc::channel::<QueueEntry>(16);

    let loop_cluster: Arc<dyn ClusterClient> = cluster.clone();
    tokio::spawn(run_admission_loop(
        rx,
        tx.clone(),
        provider,
        loop_cluster,
        LaunchConfig {
            namespace: "pipelines".into(),
            pipeline_name: "sales".into(),
            image: "churro-extract:latest".into(),
        },
        AdmissionConfig {
            backoff: Duration::from_millis(50),
        },
    ));

    tx.send(entry(&watch_dir, "a.csv")).await.unwrap();
    tx.send(entry(&watch_dir, "b.csv")).await.unwrap();

    let c = cluster.clone();
    assert!(wait_for(move || c.worker_names().len() == 1, Duration::from_secs(2)).await);

    // Control plane raises the cap; the re-read document admits the
    // backpressured entry without any restart.
    std::fs::write(&config_path, pipeline_doc(&watch_dir, 2)).unwrap();

    let c = cluster.clone();
    assert!(
        wait_for(move || c.worker_names().len() == 2, Duration::from_secs(2)).await,
        "raised max_jobs was not observed"
    );
}

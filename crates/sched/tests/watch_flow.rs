//! Watcher behavior against the real filesystem: the stage-then-rename
//! upload convention produces exactly one queue entry, and
//! non-matching names never enqueue.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use churro_core::{ExtractSource, Scheme};
use churro_sched::watch::READY_SUBDIR;
use churro_sched::{arm_watch, QueueEntry, WatchRegistry};

fn source(dir: &std::path::Path) -> ExtractSource {
    ExtractSource {
        id: "src1".into(),
        name: "csvfiles".into(),
        path: dir.display().to_string(),
        scheme: Scheme::Csv,
        regex: r".*\.csv$".into(),
        tablename: "sales".into(),
        cron_expression: None,
        skip_headers: 0,
        extract_rules: BTreeMap::new(),
        extensions: BTreeMap::new(),
        initialized: false,
        running: false,
    }
}

/// Write a file into ready/ and rename it up into the watched dir,
/// exactly as both upload paths do.
fn stage_and_publish(dir: &std::path::Path, name: &str, contents: &[u8]) {
    let staged = dir.join(READY_SUBDIR).join(name);
    let mut f = std::fs::File::create(&staged).unwrap();
    f.write_all(contents).unwrap();
    f.sync_all().unwrap();
    drop(f);
    std::fs::rename(&staged, dir.join(name)).unwrap();
}

#[tokio::test]
async fn staged_rename_triggers_exactly_one_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("csv");
    let src = source(&dir);
    let (tx, mut rx) = mpsc::channel::<QueueEntry>(16);
    let registry = WatchRegistry::new();

    assert!(arm_watch(&src, tx, &registry).unwrap());
    // Give the OS watcher a moment to arm before producing events.
    tokio::time::sleep(Duration::from_millis(200)).await;

    stage_and_publish(&dir, "orders.csv", b"a,b\n1,2\n");

    let entry = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no queue entry within timeout")
        .expect("queue closed");
    assert_eq!(entry.path, dir.join("orders.csv"));
    assert_eq!(entry.dir, dir);

    // The write into ready/ itself must not have produced a second
    // entry for the same file.
    assert!(
        timeout(Duration::from_millis(300), rx.recv()).await.is_err(),
        "unexpected extra queue entry"
    );
}

#[tokio::test]
async fn non_matching_names_never_enqueue() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("csv");
    let src = source(&dir);
    let (tx, mut rx) = mpsc::channel::<QueueEntry>(16);
    let registry = WatchRegistry::new();

    arm_watch(&src, tx, &registry).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    stage_and_publish(&dir, "notes.txt", b"not a csv");

    assert!(
        timeout(Duration::from_millis(500), rx.recv()).await.is_err(),
        "non-matching file produced a queue entry"
    );
}

//! Directory watcher: filesystem notifications → admission queue entries.
//!
//! The OS-level mechanism lives behind a small seam: [`decode_event`]
//! reduces a raw `notify` event to `(FileEventKind, path)` pairs, and
//! [`should_enqueue`] decides which of those become work. Both are pure
//! so the filter logic is testable without touching the OS. Only
//! *close-after-write* and *moved-into-directory* events on a
//! regex-matching name enqueue — create fires before content is fully
//! written and would race the worker's read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use churro_core::{ChurroError, ExtractSource, Result};

/// Staging subdirectory used by the upload paths; files land here and
/// are renamed up one level to trigger detection exactly once.
pub const READY_SUBDIR: &str = "ready";

// ── Queue entry ───────────────────────────────────────────────

/// One unit of admission-queue work. In-process only; consumed exactly
/// once (or re-enqueued on backpressure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Absolute path of the ready file.
    pub path: PathBuf,
    /// The watched directory that produced it.
    pub dir: PathBuf,
    /// The match expression the file name satisfied.
    pub regex: String,
}

// ── Event decoding ────────────────────────────────────────────

/// What a raw filesystem notification meant for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    CloseWrite,
    MovedTo,
    Created,
    Removed,
    MovedFrom,
    Other,
}

/// Decode a notify event into `(kind, path)` pairs.
pub fn decode_event(event: &Event) -> Vec<(FileEventKind, PathBuf)> {
    let kind = match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => FileEventKind::CloseWrite,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => FileEventKind::MovedTo,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => FileEventKind::MovedFrom,
        EventKind::Create(_) => FileEventKind::Created,
        EventKind::Remove(_) => FileEventKind::Removed,
        _ => FileEventKind::Other,
    };
    event.paths.iter().map(|p| (kind, p.clone())).collect()
}

/// True only for a ready-to-read event whose file name matches the
/// source's expression. Everything else is observed but not enqueued.
pub fn should_enqueue(kind: FileEventKind, path: &Path, regex: &Regex) -> bool {
    if !matches!(kind, FileEventKind::CloseWrite | FileEventKind::MovedTo) {
        return false;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| regex.is_match(name))
        .unwrap_or(false)
}

// ── Watch registry ────────────────────────────────────────────

/// Armed watches keyed by directory. Re-arming an already-watched path
/// is a no-op, which keeps `CreateExtractSource` idempotent.
#[derive(Default)]
pub struct WatchRegistry {
    armed: Mutex<HashMap<PathBuf, String>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `dir` already has an armed watch.
    fn contains(&self, dir: &Path) -> bool {
        self.armed
            .lock()
            .expect("watch registry lock poisoned")
            .contains_key(dir)
    }

    /// Record `dir` as watched by `source`. Returns false when the
    /// directory was already armed.
    fn insert(&self, dir: PathBuf, source: &str) -> bool {
        let mut armed = self.armed.lock().expect("watch registry lock poisoned");
        if armed.contains_key(&dir) {
            return false;
        }
        armed.insert(dir, source.to_string());
        true
    }

    /// Snapshot of (directory, source name) pairs currently armed.
    pub fn snapshot(&self) -> Vec<(PathBuf, String)> {
        let armed = self.armed.lock().expect("watch registry lock poisoned");
        let mut entries: Vec<_> = armed
            .iter()
            .map(|(dir, src)| (dir.clone(), src.clone()))
            .collect();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        self.armed.lock().expect("watch registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Arming ────────────────────────────────────────────────────

/// Arm a watch for one drop-style source.
///
/// Creates the watched directory and its `ready/` staging subdirectory
/// if missing, then runs the notify watcher on an OS thread that
/// forwards decoded events into a tokio channel; a tokio task drains
/// that channel, filters, and block-sends entries into the admission
/// queue. Returns false (without re-arming) when the directory is
/// already watched.
///
/// A watcher that fails to start or read terminates this directory's
/// watch with an error log; it is not retried automatically.
pub fn arm_watch(
    source: &ExtractSource,
    queue_tx: mpsc::Sender<QueueEntry>,
    registry: &WatchRegistry,
) -> Result<bool> {
    if source.scheme.is_api() {
        return Err(ChurroError::InvalidSource(format!(
            "api source '{}' is not watchable",
            source.name
        )));
    }

    let dir = PathBuf::from(&source.path);
    if registry.contains(&dir) {
        debug!(dir = %dir.display(), "watch already armed");
        return Ok(false);
    }

    // Stage dirs must exist before the watch starts or the first
    // upload would race directory creation.
    std::fs::create_dir_all(dir.join(READY_SUBDIR))?;

    let regex = Regex::new(&source.regex).map_err(|e| {
        ChurroError::InvalidSource(format!("source '{}' regex: {}", source.name, e))
    })?;

    // Register only now that the directories exist and the expression
    // compiles; a failed arm must stay re-armable.
    if !registry.insert(dir.clone(), &source.name) {
        return Ok(false);
    }

    let (event_tx, mut event_rx) = mpsc::channel::<(FileEventKind, PathBuf)>(256);

    // Capture the runtime handle BEFORE spawning the OS thread;
    // Handle::current() requires an active tokio context.
    let rt = tokio::runtime::Handle::current();

    let watch_dir = dir.clone();
    let source_name = source.name.clone();
    std::thread::spawn(move || {
        let tx = event_tx;
        let mut watcher: RecommendedWatcher = match notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for pair in decode_event(&event) {
                        let tx = tx.clone();
                        rt.spawn(async move {
                            let _ = tx.send(pair).await;
                        });
                    }
                }
                Err(e) => {
                    error!("watch event stream error: {}", e);
                }
            },
        ) {
            Ok(w) => w,
            Err(e) => {
                error!(dir = %watch_dir.display(), "failed to create watcher: {}", e);
                return;
            }
        };

        // Non-recursive: the ready/ staging subdirectory must stay
        // invisible or partially-written uploads would be observed.
        if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
            error!(dir = %watch_dir.display(), "failed to watch: {}", e);
            return;
        }

        info!(dir = %watch_dir.display(), source = %source_name, "watching for drops");

        // Keep the watcher alive for the process lifetime.
        loop {
            std::thread::sleep(std::time::Duration::from_secs(60));
        }
    });

    let entry_dir = dir;
    let entry_regex = source.regex.clone();
    tokio::spawn(async move {
        while let Some((kind, path)) = event_rx.recv().await {
            if !should_enqueue(kind, &path, &regex) {
                debug!(?kind, path = %path.display(), "event ignored");
                continue;
            }
            let entry = QueueEntry {
                path: path.clone(),
                dir: entry_dir.clone(),
                regex: entry_regex.clone(),
            };
            // Blocking send: the watcher waits rather than dropping files.
            if queue_tx.send(entry).await.is_err() {
                warn!(dir = %entry_dir.display(), "admission queue closed; watch task exiting");
                break;
            }
            info!(path = %path.display(), "file enqueued for extraction");
        }
    });

    Ok(true)
}

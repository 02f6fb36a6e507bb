//! Watch event types and debounce state

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Default debounce window in milliseconds
pub const DEBOUNCE_MS: u64 = 250;

/// Watch session options
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// File or directory to watch
    pub root: PathBuf,
    /// Descend into subdirectories when the root is a directory
    pub recursive: bool,
    /// Window used to coalesce bursts of edits into one pass
    pub debounce: Duration,
}

impl WatchOptions {
    pub fn new(root: PathBuf, recursive: bool) -> Self {
        Self {
            root,
            recursive,
            debounce: Duration::from_millis(DEBOUNCE_MS),
        }
    }
}

/// Watch lifecycle events, serializable as NDJSON for CI output
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    WatchStarted {
        root: String,
    },
    FileChanged {
        path: String,
    },
    PassStarted,
    PassComplete {
        applied: usize,
        skipped: usize,
        failed: usize,
    },
    Error {
        message: String,
    },
    Stopped,
}

impl WatchEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Watch session lifecycle
///
/// `Idle -> Watching -> Debouncing -> Reconciling -> Watching`, with
/// `Stopped` reachable from every state on cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Watching,
    Debouncing,
    Reconciling,
    Stopped,
}

/// Debounce bookkeeping: pending changed paths and the burst clock
pub(crate) struct DebounceState {
    pending: HashSet<PathBuf>,
    last_change: Option<Instant>,
    window: Duration,
}

impl DebounceState {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            pending: HashSet::new(),
            last_change: None,
            window,
        }
    }

    pub(crate) fn add_change(&mut self, path: PathBuf) {
        self.pending.insert(path);
        self.last_change = Some(Instant::now());
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// True once the burst has settled for a full window
    pub(crate) fn should_fire(&self) -> bool {
        match self.last_change {
            Some(last) => !self.pending.is_empty() && last.elapsed() >= self.window,
            None => false,
        }
    }

    pub(crate) fn take_changes(&mut self) -> Vec<PathBuf> {
        let mut changes: Vec<PathBuf> = self.pending.drain().collect();
        changes.sort();
        self.last_change = None;
        changes
    }
}

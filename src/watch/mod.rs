//! Continuous sync via file watching
//!
//! Wraps the discover/diff/apply pipeline in a loop driven by filesystem
//! events. Each pass re-reads the whole root rather than just the
//! changed files, since cross-file references may need re-validation.
//! Change events arriving while a pass runs queue up in the channel and
//! coalesce into exactly one follow-up pass; passes never overlap.

mod event;

pub use event::{SessionState, WatchEvent, WatchOptions, DEBOUNCE_MS};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event as NotifyEvent, RecommendedWatcher, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};

use crate::codec::DocFormat;
use crate::error::{LatticeError, LatticeResult};
use crate::plan::{build_apply_plan, RemoteInventory};
use crate::reconcile::{Reconciler, SyncReport};
use crate::registry::KindRegistry;
use crate::remote::RemoteClient;
use crate::source::{find_document_files, parse_source, DocumentSource, NoFetch};

use event::DebounceState;

/// SHA-256 content hash used to drop editor no-op events
fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

fn is_document_path(path: &std::path::Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(DocFormat::from_extension)
        .is_some()
}

/// Watch a root and keep the control plane in sync with it
///
/// Runs one initial pass, then reconciles again after every debounced
/// burst of changes. `running` is the external stop signal: flipping it
/// to `false` lets an in-flight pass finish, suppresses any further
/// pass, and returns.
pub fn watch(
    options: WatchOptions,
    client: &dyn RemoteClient,
    registry: &KindRegistry,
    running: Arc<AtomicBool>,
    event_callback: impl Fn(WatchEvent),
) -> LatticeResult<()> {
    event_callback(WatchEvent::WatchStarted {
        root: options.root.display().to_string(),
    });

    let mut session = Session::new();

    // initial full pass
    session.enter(SessionState::Reconciling);
    run_pass(&options, client, registry, &event_callback);

    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |result: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = result {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
        },
        Config::default(),
    )
    .map_err(|e| LatticeError::Io(std::io::Error::other(e.to_string())))?;

    let mode = if options.recursive || options.root.is_dir() {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher
        .watch(&options.root, mode)
        .map_err(|e| LatticeError::Io(std::io::Error::other(e.to_string())))?;

    let mut debounce = DebounceState::new(options.debounce);
    let mut content_hashes = seed_content_hashes(&options);
    session.enter(SessionState::Watching);

    while running.load(Ordering::SeqCst) {
        if let Ok(path) = rx.recv_timeout(Duration::from_millis(50)) {
            if is_document_path(&path) {
                let canonical = path.canonicalize().unwrap_or(path);
                match std::fs::read(&canonical) {
                    Ok(bytes) => {
                        let new_hash = content_hash(&bytes);
                        if content_hashes.get(&canonical) == Some(&new_hash) {
                            // editor noise, content unchanged
                            continue;
                        }
                        content_hashes.insert(canonical.clone(), new_hash);
                    }
                    // deleted or unreadable: forget it and re-plan
                    Err(_) => {
                        content_hashes.remove(&canonical);
                    }
                }
                debounce.add_change(canonical);
                session.enter(SessionState::Debouncing);
            }
        }

        if debounce.should_fire() {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            for path in debounce.take_changes() {
                event_callback(WatchEvent::FileChanged {
                    path: path.display().to_string(),
                });
            }
            session.enter(SessionState::Reconciling);
            run_pass(&options, client, registry, &event_callback);
            session.enter(SessionState::Watching);
        }
    }

    session.enter(SessionState::Stopped);
    event_callback(WatchEvent::Stopped);
    Ok(())
}

/// Current position of one watch session in its lifecycle
struct Session {
    state: SessionState,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    /// Move to the next state, `Stopped` being terminal
    fn enter(&mut self, next: SessionState) -> SessionState {
        if self.state != SessionState::Stopped {
            self.state = next;
        }
        self.state
    }
}

fn seed_content_hashes(options: &WatchOptions) -> HashMap<PathBuf, String> {
    let mut hashes = HashMap::new();
    let files = if options.root.is_dir() {
        find_document_files(&options.root, options.recursive).unwrap_or_default()
    } else {
        vec![options.root.clone()]
    };
    for file in files {
        let canonical = file.canonicalize().unwrap_or(file);
        if let Ok(bytes) = std::fs::read(&canonical) {
            hashes.insert(canonical, content_hash(&bytes));
        }
    }
    hashes
}

fn run_pass(
    options: &WatchOptions,
    client: &dyn RemoteClient,
    registry: &KindRegistry,
    event_callback: &impl Fn(WatchEvent),
) {
    event_callback(WatchEvent::PassStarted);
    match perform_pass(options, client, registry) {
        Ok(report) => event_callback(WatchEvent::PassComplete {
            applied: report.applied_count(),
            skipped: report.skipped_count(),
            failed: report.failed_count() + report.malformed.len(),
        }),
        Err(err) => event_callback(WatchEvent::Error {
            message: err.to_string(),
        }),
    }
}

fn perform_pass(
    options: &WatchOptions,
    client: &dyn RemoteClient,
    registry: &KindRegistry,
) -> LatticeResult<SyncReport> {
    let source = if options.root.is_dir() {
        DocumentSource::Directory {
            root: options.root.clone(),
            recursive: options.recursive,
        }
    } else {
        DocumentSource::File(options.root.clone())
    };
    let raw = source.produce(&NoFetch)?;
    let parsed = parse_source(&raw, registry);
    let inventory = RemoteInventory::for_documents(client, &parsed.documents)?;
    let plan = build_apply_plan(&parsed, &inventory);
    Ok(Reconciler::new(client).execute(&plan))
}

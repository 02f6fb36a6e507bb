//! Plan execution
//!
//! Stage 2 of a reconciliation pass: run a `SyncPlan` against the remote
//! client, one operation at a time, preserving plan order. A failed
//! operation never aborts the rest of the plan; the caller reads the
//! aggregate report and decides the exit status.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::document::MalformedEntry;
use crate::plan::{SkippedDocument, SyncOperation, SyncPlan};
use crate::remote::{DeleteOutcome, RemoteClient};

/// What a successful operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyVerb {
    Created,
    Updated,
    Deleted,
}

impl std::fmt::Display for ApplyVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Outcome of one executed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Applied { verb: ApplyVerb },
    /// No-op, e.g. deleting an id that was already gone
    Skipped,
    Failed { reason: String },
}

/// Per-operation entry of the final report
#[derive(Debug, Clone, PartialEq)]
pub struct OperationReport {
    pub kind: String,
    pub id: String,
    pub origin: String,
    pub outcome: OperationOutcome,
}

/// Aggregate result of one reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub operations: Vec<OperationReport>,
    /// Documents skipped at plan time because they matched remote state
    pub skipped: Vec<SkippedDocument>,
    pub malformed: Vec<MalformedEntry>,
    /// True when a cancellation signal stopped the pass early
    pub cancelled: bool,
}

impl SyncReport {
    pub fn applied_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op.outcome, OperationOutcome::Applied { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op.outcome, OperationOutcome::Failed { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
            + self
                .operations
                .iter()
                .filter(|op| matches!(op.outcome, OperationOutcome::Skipped))
                .count()
    }

    /// The sole signal callers use for the process exit status
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0 && self.malformed.is_empty()
    }
}

/// Progress event emitted while executing a plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    OperationStart {
        index: usize,
        kind: String,
        id: String,
    },
    OperationApplied {
        index: usize,
        kind: String,
        id: String,
        verb: ApplyVerb,
    },
    OperationSkipped {
        index: usize,
        kind: String,
        id: String,
    },
    OperationFailed {
        index: usize,
        kind: String,
        id: String,
        reason: String,
    },
}

impl SyncEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Executes sync plans against a remote client
///
/// Holds no connection state of its own; the client and the optional
/// cancellation flag are passed in so the reconciler stays testable with
/// a fake remote.
pub struct Reconciler<'a> {
    client: &'a dyn RemoteClient,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a dyn RemoteClient) -> Self {
        Self {
            client,
            cancel: None,
        }
    }

    /// Attach a cancellation flag checked before each operation
    ///
    /// Once the flag is raised no new operation starts; the operation in
    /// flight finishes and the report marks the pass as partial.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn execute(&self, plan: &SyncPlan) -> SyncReport {
        self.execute_with_callback::<fn(SyncEvent)>(plan, None)
    }

    pub fn execute_with_callback<F>(&self, plan: &SyncPlan, mut callback: Option<F>) -> SyncReport
    where
        F: FnMut(SyncEvent),
    {
        let mut report = SyncReport {
            skipped: plan.skipped.clone(),
            malformed: plan.malformed.clone(),
            ..Default::default()
        };

        for (index, operation) in plan.operations.iter().enumerate() {
            if let Some(cancel) = &self.cancel {
                if cancel.load(Ordering::SeqCst) {
                    report.cancelled = true;
                    break;
                }
            }

            let kind = operation.kind().kind.clone();
            let id = operation.id_label();
            if let Some(cb) = callback.as_mut() {
                cb(SyncEvent::OperationStart {
                    index,
                    kind: kind.clone(),
                    id: id.clone(),
                });
            }

            let outcome = self.run_operation(operation);

            if let Some(cb) = callback.as_mut() {
                match &outcome {
                    OperationOutcome::Applied { verb } => cb(SyncEvent::OperationApplied {
                        index,
                        kind: kind.clone(),
                        id: id.clone(),
                        verb: *verb,
                    }),
                    OperationOutcome::Skipped => cb(SyncEvent::OperationSkipped {
                        index,
                        kind: kind.clone(),
                        id: id.clone(),
                    }),
                    OperationOutcome::Failed { reason } => cb(SyncEvent::OperationFailed {
                        index,
                        kind: kind.clone(),
                        id: id.clone(),
                        reason: reason.clone(),
                    }),
                }
            }

            report.operations.push(OperationReport {
                kind,
                id,
                origin: operation.origin().to_string(),
                outcome,
            });
        }

        report
    }

    fn run_operation(&self, operation: &SyncOperation) -> OperationOutcome {
        match operation {
            SyncOperation::Create { doc } => {
                match self.client.create(&doc.kind, &doc.body) {
                    Ok(_) => OperationOutcome::Applied {
                        verb: ApplyVerb::Created,
                    },
                    Err(err) => OperationOutcome::Failed {
                        reason: err.to_string(),
                    },
                }
            }
            SyncOperation::Update {
                id,
                doc,
                expected_revision,
            } => {
                match self.client.replace(
                    &doc.kind,
                    id,
                    &doc.body,
                    expected_revision.as_deref(),
                ) {
                    Ok(_) => OperationOutcome::Applied {
                        verb: ApplyVerb::Updated,
                    },
                    Err(err) => OperationOutcome::Failed {
                        reason: err.to_string(),
                    },
                }
            }
            SyncOperation::Delete { kind, id, .. } => match self.client.delete(kind, id) {
                Ok(DeleteOutcome::Deleted) => OperationOutcome::Applied {
                    verb: ApplyVerb::Deleted,
                },
                // already gone: a no-op, not a failure
                Ok(DeleteOutcome::NotFound) => OperationOutcome::Skipped,
                Err(err) => OperationOutcome::Failed {
                    reason: err.to_string(),
                },
            },
        }
    }
}

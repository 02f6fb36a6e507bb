//! latticectl - declarative resource synchronization for the Lattice control plane
//!
//! latticectl reconciles locally declared entity documents (JSON or YAML,
//! from files, directories, stdin, URLs or inline arguments) against the
//! authoritative state held by a remote control plane, with continuous
//! sync via file watching and bulk export/import. Entity kinds are
//! discovered from the control plane at runtime; nothing here hardcodes
//! a schema.

pub mod cli;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod plan;
pub mod reconcile;
pub mod registry;
pub mod remote;
pub mod source;
pub mod watch;

// Re-exports for convenience
pub use codec::{decode_documents, decode_tree, encode_documents, encode_tree, DocFormat};
pub use config::ConnectionConfig;
pub use document::{DesiredDocument, MalformedEntry, RemoteResource};
pub use error::{LatticeError, LatticeResult};
pub use export::{export_inventory, import_file, ExportLayout, ExportOptions, ExportReport};
pub use plan::{build_apply_plan, build_delete_plan, RemoteInventory, SyncOperation, SyncPlan};
pub use reconcile::{OperationOutcome, Reconciler, SyncEvent, SyncReport};
pub use registry::{EntityKind, KindRegistry};
pub use remote::{DeleteOutcome, HttpRemote, RemoteClient};
pub use source::{parse_source, DocumentSource, ParsedSource, RawDocument, UrlFetcher};
pub use watch::{watch, WatchEvent, WatchOptions};

//! Bulk export and import
//!
//! Export pulls the remote inventory and writes it out under one of
//! three layouts; import feeds a previously produced export back through
//! the same plan/reconcile path as `apply`. Exporting an empty remote
//! inventory is not an error; files are written atomically so a killed
//! export never leaves half a document behind.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::codec::{encode_documents, encode_tree, wrap_manifest, DocFormat};
use crate::error::{LatticeError, LatticeResult};
use crate::plan::{build_apply_plan, RemoteInventory};
use crate::reconcile::{Reconciler, SyncReport};
use crate::registry::{EntityKind, KindRegistry};
use crate::remote::RemoteClient;
use crate::source::{parse_source, DocumentSource, NoFetch};

/// How exported resources map onto files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportLayout {
    /// Every resource of every kind in one file
    #[default]
    Aggregate,
    /// One file per kind, named after the kind's plural
    PerKind,
    /// One directory per kind, one file per resource named by id
    PerResource,
}

/// Export settings
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub layout: ExportLayout,
    pub format: DocFormat,
    /// Wrap each document in a manifest envelope
    pub armor: bool,
    /// Restrict the export to these kinds (names or aliases)
    pub kinds: Option<Vec<String>>,
}

/// What an export produced
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub files: Vec<PathBuf>,
    pub resources: usize,
}

/// Write content to a file atomically (tempfile + persist)
pub(crate) fn atomic_write(path: &Path, content: &str) -> LatticeResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut file, content.as_bytes())?;
    file.persist(path)
        .map_err(|e| LatticeError::Io(e.error))?;
    Ok(())
}

fn export_kinds<'a>(
    registry: &'a KindRegistry,
    options: &ExportOptions,
) -> LatticeResult<Vec<&'a EntityKind>> {
    match &options.kinds {
        Some(names) => names.iter().map(|name| registry.resolve(name)).collect(),
        None => Ok(registry.kinds().iter().collect()),
    }
}

/// Turn a remote body into an exportable document
fn export_document(kind: &EntityKind, body: Value, armor: bool) -> Value {
    if armor {
        wrap_manifest(&body, kind)
    } else {
        let mut doc = body;
        if let Value::Object(map) = &mut doc {
            map.insert("kind".to_string(), Value::String(kind.kind.clone()));
        }
        doc
    }
}

/// Export the remote inventory to a file or directory
///
/// `dest` is a file path for the aggregate layout and a directory for
/// the split layouts. Kinds with no resources produce no files.
pub fn export_inventory(
    client: &dyn RemoteClient,
    registry: &KindRegistry,
    dest: &Path,
    options: &ExportOptions,
) -> LatticeResult<ExportReport> {
    let kinds = export_kinds(registry, options)?;
    let mut report = ExportReport::default();

    match options.layout {
        ExportLayout::Aggregate => {
            let mut docs = Vec::new();
            for kind in kinds {
                for resource in client.list(kind, &[])? {
                    docs.push(export_document(kind, resource.body, options.armor));
                }
            }
            report.resources = docs.len();
            atomic_write(dest, &encode_documents(&docs, options.format)?)?;
            report.files.push(dest.to_path_buf());
        }
        ExportLayout::PerKind => {
            for kind in kinds {
                let docs: Vec<Value> = client
                    .list(kind, &[])?
                    .into_iter()
                    .map(|resource| export_document(kind, resource.body, options.armor))
                    .collect();
                if docs.is_empty() {
                    continue;
                }
                report.resources += docs.len();
                let file = dest.join(format!(
                    "{}.{}",
                    kind.plural_name,
                    options.format.extension()
                ));
                atomic_write(&file, &encode_documents(&docs, options.format)?)?;
                report.files.push(file);
            }
        }
        ExportLayout::PerResource => {
            for kind in kinds {
                for resource in client.list(kind, &[])? {
                    let doc = export_document(kind, resource.body, options.armor);
                    let file = dest.join(&kind.plural_name).join(format!(
                        "{}.{}",
                        resource.id,
                        options.format.extension()
                    ));
                    atomic_write(&file, &encode_tree(&doc, options.format)?)?;
                    report.files.push(file);
                    report.resources += 1;
                }
            }
        }
    }

    Ok(report)
}

/// Import a previously exported file
///
/// The whole file is treated as one desired document set and runs
/// through the same plan/reconcile path as `apply`.
pub fn import_file(
    path: &Path,
    format: Option<DocFormat>,
    client: &dyn RemoteClient,
    registry: &KindRegistry,
) -> LatticeResult<SyncReport> {
    let source = DocumentSource::File(path.to_path_buf());
    let mut raw = source.produce(&NoFetch)?;
    if let Some(format) = format {
        for doc in &mut raw {
            doc.format = Some(format);
        }
    }
    let parsed = parse_source(&raw, registry);
    if parsed.is_empty() {
        return Err(LatticeError::EmptySource {
            origin: path.display().to_string(),
        });
    }
    let inventory = RemoteInventory::for_documents(client, &parsed.documents)?;
    let plan = build_apply_plan(&parsed, &inventory);
    Ok(Reconciler::new(client).execute(&plan))
}

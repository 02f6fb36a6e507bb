//! Command-line surface
//!
//! Thin orchestration over the library: argument parsing via clap,
//! wiring of config/client/registry, and plain-line or NDJSON progress
//! output. Exit status is decided here from the aggregate report; the
//! engine itself never exits the process.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

use crate::codec::{fold_data_pairs, wrap_manifest, DocFormat};
use crate::config::ConnectionConfig;
use crate::error::LatticeError;
use crate::export::{export_inventory, import_file, ExportLayout, ExportOptions};
use crate::plan::{
    build_apply_plan, build_delete_plan, build_delete_plan_for_ids, RemoteInventory, SyncOperation,
    SyncPlan,
};
use crate::reconcile::{Reconciler, SyncEvent, SyncReport};
use crate::registry::{EntityKind, KindRegistry};
use crate::remote::{HttpFetcher, HttpRemote, RemoteClient};
use crate::source::{parse_source, DocumentSource};
use crate::watch::{watch, WatchEvent, WatchOptions};

/// latticectl - declarative resource synchronization for the Lattice control plane
#[derive(Parser, Debug)]
#[command(name = "latticectl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format for fetched documents
    #[arg(long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Emit NDJSON progress events instead of plain lines
    #[arg(long, global = true)]
    pub json_events: bool,

    /// Path to the connection config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Control-plane base URL (overrides config and environment)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Bearer token (overrides config and environment)
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    JsonPretty,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    Aggregate,
    PerKind,
    PerResource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Json,
    Yaml,
    NdJson,
}

impl From<LayoutArg> for ExportLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Aggregate => Self::Aggregate,
            LayoutArg::PerKind => Self::PerKind,
            LayoutArg::PerResource => Self::PerResource,
        }
    }
}

impl From<FormatArg> for DocFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => Self::Json,
            FormatArg::Yaml => Self::Yaml,
            FormatArg::NdJson => Self::NdJson,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the entity kinds registered on the control plane
    Kinds,

    /// Fetch one resource, or list every resource of a kind
    Get {
        /// Kind name, singular or plural alias
        resource: String,

        /// Resource id; omit to list the whole kind
        id: Option<String>,

        /// Wrap output in a manifest envelope
        #[arg(long)]
        armor: bool,

        /// Server-side list filter, `field=value` (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,
    },

    /// Fetch the server-provided template document for a kind
    Template {
        resource: String,

        /// Wrap output in a manifest envelope
        #[arg(long)]
        armor: bool,
    },

    /// Reconcile declared documents against the control plane
    Apply {
        /// Document file or URL
        #[arg(short, long)]
        file: Option<String>,

        /// Directory of document files
        #[arg(long)]
        directory: Option<PathBuf>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Read documents from stdin
        #[arg(long)]
        stdin: bool,

        /// Inline document text
        #[arg(long)]
        inline: Option<String>,

        /// Inline `path=value` pair (repeatable)
        #[arg(short, long)]
        data: Vec<String>,

        /// Keep watching the file or directory and re-sync on change
        #[arg(short, long)]
        watch: bool,

        /// Print the plan without applying it
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete resources by explicit id or from declared documents
    Delete {
        /// Kind name when deleting by id
        resource: Option<String>,

        /// Ids to delete
        ids: Vec<String>,

        /// Document file or URL naming resources to delete
        #[arg(short, long)]
        file: Option<String>,

        /// Directory of documents naming resources to delete
        #[arg(long)]
        directory: Option<PathBuf>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Merge-patch one resource
    Patch {
        resource: String,
        id: String,

        /// Patch document file
        #[arg(short, long)]
        file: Option<String>,

        /// Inline patch document
        #[arg(long)]
        merge: Option<String>,

        /// Inline `path=value` pair folded into the patch (repeatable)
        #[arg(short, long)]
        data: Vec<String>,

        /// Read the patch from stdin
        #[arg(long)]
        stdin: bool,
    },

    /// Export the remote inventory to a file or directory
    Export {
        /// Destination file (aggregate layout)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Destination directory (split layouts)
        #[arg(long)]
        directory: Option<PathBuf>,

        /// File layout strategy
        #[arg(long, value_enum)]
        layout: Option<LayoutArg>,

        /// Document format
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Wrap every document in a manifest envelope
        #[arg(long)]
        armor: bool,

        /// Restrict the export to these kinds (repeatable)
        #[arg(short, long)]
        kinds: Vec<String>,
    },

    /// Import a previously exported file
    Import {
        file: PathBuf,

        /// Treat the file as newline-delimited JSON
        #[arg(long)]
        nd_json: bool,
    },
}

/// Parse `field=value` filter arguments
fn parse_filters(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|item| {
            item.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .with_context(|| format!("invalid filter '{item}', expected field=value"))
        })
        .collect()
}

fn render(value: &Value, output: Option<OutputFormat>) -> Result<String> {
    Ok(match output.unwrap_or(OutputFormat::JsonPretty) {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml_ng::to_string(value)?,
    })
}

/// Attach the kind name to a bare body for display
fn with_kind(body: &Value, kind: &EntityKind) -> Value {
    let mut doc = body.clone();
    if let Value::Object(map) = &mut doc {
        map.insert("kind".to_string(), Value::String(kind.kind.clone()));
    }
    doc
}

fn pick_apply_source(
    file: &Option<String>,
    directory: &Option<PathBuf>,
    recursive: bool,
    stdin: bool,
    inline: &Option<String>,
    data: &[String],
) -> Result<DocumentSource> {
    if let Some(file) = file {
        Ok(DocumentSource::from_file_arg(file))
    } else if let Some(root) = directory {
        Ok(DocumentSource::Directory {
            root: root.clone(),
            recursive,
        })
    } else if stdin {
        Ok(DocumentSource::Stdin)
    } else if let Some(text) = inline {
        Ok(DocumentSource::Inline(text.clone()))
    } else if !data.is_empty() {
        Ok(DocumentSource::Data(data.to_vec()))
    } else {
        bail!("you need to provide a file, directory, stdin, inline text or data pairs");
    }
}

fn print_plan(plan: &SyncPlan) {
    if plan.is_empty() {
        println!("nothing to apply");
        return;
    }
    for op in &plan.operations {
        let action = match op {
            SyncOperation::Create { .. } => "create",
            SyncOperation::Update { .. } => "update",
            SyncOperation::Delete { .. } => "delete",
        };
        println!(
            "  - would {} {}/{} ({})",
            action,
            op.kind().singular_name,
            op.id_label(),
            op.origin()
        );
    }
    for skipped in &plan.skipped {
        println!("  - unchanged {}/{}", skipped.kind, skipped.id);
    }
    for bad in &plan.malformed {
        eprintln!("  - malformed {}: {}", bad.origin, bad.message);
    }
}

fn sync_event_printer(json_events: bool) -> impl FnMut(SyncEvent) {
    move |event: SyncEvent| {
        if json_events {
            println!("{}", event.to_json());
            return;
        }
        match event {
            SyncEvent::OperationApplied { kind, id, verb, .. } => {
                println!("  - {kind}/{id}: {verb}");
            }
            SyncEvent::OperationSkipped { kind, id, .. } => {
                println!("  - {kind}/{id}: already absent");
            }
            SyncEvent::OperationFailed {
                kind, id, reason, ..
            } => {
                eprintln!("  - {kind}/{id}: error - {reason}");
            }
            SyncEvent::OperationStart { .. } => {}
        }
    }
}

fn finish_report(report: &SyncReport) -> i32 {
    for skipped in &report.skipped {
        println!("  - {}/{}: unchanged", skipped.kind, skipped.id);
    }
    for bad in &report.malformed {
        eprintln!("  - malformed {}: {}", bad.origin, bad.message);
    }
    if report.cancelled {
        eprintln!("cancelled, partial completion");
    }
    println!(
        "{} applied, {} unchanged, {} failed",
        report.applied_count(),
        report.skipped_count(),
        report.failed_count() + report.malformed.len()
    );
    if report.is_success() {
        0
    } else {
        1
    }
}

/// Run the CLI, returning the process exit code
pub fn run(cli: Cli) -> Result<i32> {
    let mut config = ConnectionConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    let client = HttpRemote::new(&config)?;
    let registry = KindRegistry::discover(&client)
        .context("failed to discover entity kinds from the control plane")?;

    match &cli.command {
        Commands::Kinds => {
            match cli.output {
                Some(_) => {
                    let value = serde_json::to_value(registry.kinds())?;
                    println!("{}", render(&value, cli.output)?);
                }
                None => {
                    for kind in registry.kinds() {
                        println!(
                            "{}\t{}\t{}\t{}",
                            kind.kind,
                            kind.singular_name,
                            kind.plural_name,
                            kind.api_version()
                        );
                    }
                }
            }
            Ok(0)
        }

        Commands::Get {
            resource,
            id,
            armor,
            filters,
        } => {
            let kind = registry.resolve(resource)?;
            match id {
                Some(id) => match client.get(kind, id)? {
                    Some(found) => {
                        let doc = if *armor {
                            wrap_manifest(&found.body, kind)
                        } else {
                            with_kind(&found.body, kind)
                        };
                        println!("{}", render(&doc, cli.output)?);
                        Ok(0)
                    }
                    None => {
                        // get on a missing id is an error, unlike delete
                        eprintln!("{}/{} not found", kind.singular_name, id);
                        Ok(1)
                    }
                },
                None => {
                    let resources = client.list(kind, &parse_filters(filters)?)?;
                    let docs: Vec<Value> = resources
                        .into_iter()
                        .map(|r| {
                            if *armor {
                                wrap_manifest(&r.body, kind)
                            } else {
                                with_kind(&r.body, kind)
                            }
                        })
                        .collect();
                    println!("{}", render(&Value::Array(docs), cli.output)?);
                    Ok(0)
                }
            }
        }

        Commands::Template { resource, armor } => {
            let kind = registry.resolve(resource)?;
            let template = client.template(kind)?;
            let doc = if *armor {
                wrap_manifest(&template, kind)
            } else {
                with_kind(&template, kind)
            };
            println!("{}", render(&doc, cli.output)?);
            Ok(0)
        }

        Commands::Apply {
            file,
            directory,
            recursive,
            stdin,
            inline,
            data,
            watch: watch_flag,
            dry_run,
        } => {
            let source = pick_apply_source(file, directory, *recursive, *stdin, inline, data)?;
            let watch_root = match (&source, *watch_flag) {
                (DocumentSource::File(path), true) => Some(path.clone()),
                (DocumentSource::Directory { root, .. }, true) => Some(root.clone()),
                (_, true) => bail!("--watch requires a file or directory source"),
                (_, false) => None,
            };
            let fetcher = HttpFetcher::new()?;
            let raw = source.produce(&fetcher)?;
            let parsed = parse_source(&raw, &registry);
            if parsed.is_empty() {
                return Err(LatticeError::EmptySource {
                    origin: source.origin_label(),
                }
                .into());
            }

            let inventory = RemoteInventory::for_documents(&client, &parsed.documents)?;
            let plan = build_apply_plan(&parsed, &inventory);

            if *dry_run {
                print_plan(&plan);
                return Ok(if plan.malformed.is_empty() { 0 } else { 1 });
            }

            // one signal covers both the initial pass and the watch loop
            let cancel = Arc::new(AtomicBool::new(false));
            let running = Arc::new(AtomicBool::new(true));
            {
                let cancel = cancel.clone();
                let running = running.clone();
                let _ = ctrlc::set_handler(move || {
                    cancel.store(true, Ordering::SeqCst);
                    running.store(false, Ordering::SeqCst);
                });
            }

            let report = Reconciler::new(&client)
                .with_cancel(cancel.clone())
                .execute_with_callback(&plan, Some(sync_event_printer(cli.json_events)));
            let code = finish_report(&report);

            if let Some(root) = watch_root.filter(|_| !cancel.load(Ordering::SeqCst)) {
                let json_events = cli.json_events;
                watch(
                    WatchOptions::new(root, *recursive),
                    &client,
                    &registry,
                    running,
                    move |event: WatchEvent| {
                        if json_events {
                            println!("{}", event.to_json());
                        } else {
                            match event {
                                WatchEvent::PassComplete {
                                    applied,
                                    skipped,
                                    failed,
                                } => println!(
                                    "pass complete: {applied} applied, {skipped} unchanged, {failed} failed"
                                ),
                                WatchEvent::FileChanged { path } => {
                                    println!("changed: {path}");
                                }
                                WatchEvent::Error { message } => eprintln!("error: {message}"),
                                _ => {}
                            }
                        }
                    },
                )?;
            }

            Ok(code)
        }

        Commands::Delete {
            resource,
            ids,
            file,
            directory,
            recursive,
        } => {
            let plan = match resource {
                Some(resource) => {
                    if ids.is_empty() {
                        bail!("no ids given for delete");
                    }
                    let kind = registry.resolve(resource)?;
                    build_delete_plan_for_ids(kind, ids)
                }
                None => {
                    let source = if let Some(file) = file {
                        DocumentSource::from_file_arg(file)
                    } else if let Some(root) = directory {
                        DocumentSource::Directory {
                            root: root.clone(),
                            recursive: *recursive,
                        }
                    } else {
                        bail!("you need to provide a kind with ids, a file or a directory");
                    };
                    let fetcher = HttpFetcher::new()?;
                    let raw = source.produce(&fetcher)?;
                    let parsed = parse_source(&raw, &registry);
                    if parsed.is_empty() {
                        return Err(LatticeError::EmptySource {
                            origin: source.origin_label(),
                        }
                        .into());
                    }
                    build_delete_plan(&parsed)
                }
            };

            let report = Reconciler::new(&client)
                .execute_with_callback(&plan, Some(sync_event_printer(cli.json_events)));
            Ok(finish_report(&report))
        }

        Commands::Patch {
            resource,
            id,
            file,
            merge,
            data,
            stdin,
        } => {
            let kind = registry.resolve(resource)?;
            let patch: Value = if !data.is_empty() {
                fold_data_pairs(data)?
            } else if let Some(file) = file {
                let fetcher = HttpFetcher::new()?;
                let source = DocumentSource::from_file_arg(file);
                let raw = source.produce(&fetcher)?;
                let first = raw.first().ok_or_else(|| LatticeError::EmptySource {
                    origin: source.origin_label(),
                })?;
                crate::codec::decode_tree(&first.bytes, first.format, &first.origin)?
            } else if let Some(inline) = merge {
                crate::codec::decode_tree(inline.as_bytes(), None, "inline")?
            } else if *stdin {
                let raw = DocumentSource::Stdin.produce(&HttpFetcher::new()?)?;
                let first = raw.first().ok_or_else(|| LatticeError::EmptySource {
                    origin: "stdin".to_string(),
                })?;
                crate::codec::decode_tree(&first.bytes, None, "stdin")?
            } else {
                bail!("you need to provide a patch via --data, --file, --merge or --stdin");
            };

            match client.merge_patch(kind, id, &patch) {
                Ok(patched) => {
                    if cli.output.is_some() {
                        println!("{}", render(&with_kind(&patched.body, kind), cli.output)?);
                    } else {
                        println!("  - {}/{}: updated", kind.kind, id);
                    }
                    Ok(0)
                }
                Err(LatticeError::NotFound { .. }) => {
                    eprintln!("{}/{} not found", kind.singular_name, id);
                    Ok(1)
                }
                Err(err) => Err(err.into()),
            }
        }

        Commands::Export {
            file,
            directory,
            layout,
            format,
            armor,
            kinds,
        } => {
            let (dest, default_layout) = match (file, directory) {
                (Some(file), None) => (file.clone(), ExportLayout::Aggregate),
                (None, Some(dir)) => (dir.clone(), ExportLayout::PerKind),
                _ => bail!("you need to provide either a file or a directory"),
            };
            let options = ExportOptions {
                layout: layout.map(Into::into).unwrap_or(default_layout),
                format: format.map(Into::into).unwrap_or(DocFormat::Json),
                armor: *armor,
                kinds: if kinds.is_empty() {
                    None
                } else {
                    Some(kinds.clone())
                },
            };
            let report = export_inventory(&client, &registry, &dest, &options)?;
            println!(
                "exported {} resources into {} files",
                report.resources,
                report.files.len()
            );
            Ok(0)
        }

        Commands::Import { file, nd_json } => {
            let format = nd_json.then_some(DocFormat::NdJson);
            let report = import_file(file, format, &client, &registry)?;
            println!(
                "{} applied, {} unchanged, {} failed",
                report.applied_count(),
                report.skipped_count(),
                report.failed_count()
            );
            Ok(if report.is_success() { 0 } else { 1 })
        }
    }
}

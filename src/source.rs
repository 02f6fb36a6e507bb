//! Document sources
//!
//! Abstracts where desired-state documents come from: a single file, a
//! URL, stdin, inline text, inline `path=value` pairs, or a directory
//! tree. Directory discovery is deterministic: entries sort
//! lexicographically by file name and recursion is depth-first, so two
//! runs over the same tree always see the same document order.

use std::io::Read;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::codec::{self, fold_data_pairs, DocFormat};
use crate::document::{DesiredDocument, MalformedEntry};
use crate::error::{LatticeError, LatticeResult};
use crate::registry::KindRegistry;

/// File extensions recognized as entity documents
const DOCUMENT_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "ndjson"];

/// Fetches bytes from a URL on behalf of a `DocumentSource`
///
/// Transport lives outside the engine; the HTTP implementation is
/// `remote::http::HttpFetcher`.
pub trait UrlFetcher {
    fn fetch(&self, url: &str) -> LatticeResult<(Vec<u8>, Option<DocFormat>)>;
}

/// A fetcher for callers that never pass URL sources
pub struct NoFetch;

impl UrlFetcher for NoFetch {
    fn fetch(&self, url: &str) -> LatticeResult<(Vec<u8>, Option<DocFormat>)> {
        Err(LatticeError::RemoteUnavailable {
            message: format!("URL source '{url}' requires network access"),
        })
    }
}

/// One raw payload produced by a source, before decoding
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    /// Format hint from the extension or content type, if any
    pub format: Option<DocFormat>,
    /// Where the payload came from, for error reporting
    pub origin: String,
}

/// Where desired-state documents come from
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Single file on disk
    File(PathBuf),
    /// Remote document fetched over HTTP(S)
    Url(String),
    /// Standard input, read to end-of-stream
    Stdin,
    /// Literal document text
    Inline(String),
    /// Inline `path=value` pairs folded into one document
    Data(Vec<String>),
    /// Directory of document files
    Directory { root: PathBuf, recursive: bool },
}

impl DocumentSource {
    /// Interpret a `--file` argument, which may actually be a URL
    pub fn from_file_arg(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            Self::Url(arg.to_string())
        } else {
            Self::File(PathBuf::from(arg))
        }
    }

    /// Label used in `EmptySource` and progress reporting
    pub fn origin_label(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
            Self::Stdin => "stdin".to_string(),
            Self::Inline(_) => "inline".to_string(),
            Self::Data(_) => "data".to_string(),
            Self::Directory { root, .. } => root.display().to_string(),
        }
    }

    /// Produce the raw documents this source holds, in discovery order
    pub fn produce(&self, fetcher: &dyn UrlFetcher) -> LatticeResult<Vec<RawDocument>> {
        match self {
            Self::File(path) => Ok(vec![read_document_file(path)?]),
            Self::Url(url) => {
                let (bytes, format) = fetcher.fetch(url)?;
                Ok(vec![RawDocument {
                    bytes,
                    format,
                    origin: url.clone(),
                }])
            }
            Self::Stdin => {
                let mut bytes = Vec::new();
                std::io::stdin().read_to_end(&mut bytes)?;
                Ok(vec![RawDocument {
                    bytes,
                    format: None,
                    origin: "stdin".to_string(),
                }])
            }
            Self::Inline(text) => Ok(vec![RawDocument {
                bytes: text.clone().into_bytes(),
                format: None,
                origin: "inline".to_string(),
            }]),
            Self::Data(pairs) => {
                let tree = fold_data_pairs(pairs)?;
                Ok(vec![RawDocument {
                    bytes: serde_json::to_vec(&tree)?,
                    format: Some(DocFormat::Json),
                    origin: "data".to_string(),
                }])
            }
            Self::Directory { root, recursive } => {
                let files = find_document_files(root, *recursive)?;
                files.iter().map(|path| read_document_file(path)).collect()
            }
        }
    }
}

fn read_document_file(path: &Path) -> LatticeResult<RawDocument> {
    let bytes = std::fs::read(path)?;
    let format = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(DocFormat::from_extension);
    Ok(RawDocument {
        bytes,
        format,
        origin: path.display().to_string(),
    })
}

/// Enumerate document files under a directory
///
/// Lexicographic by file name within each directory, depth-first into
/// subdirectories when `recursive` is set.
pub fn find_document_files(root: &Path, recursive: bool) -> LatticeResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(LatticeError::DirectoryNotFound {
            path: root.to_path_buf(),
        });
    }
    let mut walker = WalkBuilder::new(root);
    walker
        .standard_filters(false)
        .follow_links(true)
        .sort_by_file_name(|a, b| a.cmp(b));
    if !recursive {
        walker.max_depth(Some(1));
    }
    let mut files = Vec::new();
    for entry in walker.build().flatten() {
        let path = entry.path();
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let recognized = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if recognized {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Result of decoding and resolving a set of raw documents
#[derive(Debug, Default)]
pub struct ParsedSource {
    /// Documents in discovery order
    pub documents: Vec<DesiredDocument>,
    /// Documents that failed to decode or resolve, in discovery order
    pub malformed: Vec<MalformedEntry>,
}

impl ParsedSource {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.malformed.is_empty()
    }
}

/// Decode raw payloads into desired documents
///
/// A document's kind comes from its armor envelope or its own `kind`
/// key. Decode and resolution failures are collected per document and
/// never abort the batch.
pub fn parse_source(raw_docs: &[RawDocument], registry: &KindRegistry) -> ParsedSource {
    let mut parsed = ParsedSource::default();
    for raw in raw_docs {
        let trees = match codec::decode_documents(&raw.bytes, raw.format, &raw.origin) {
            Ok(trees) => trees,
            Err(err) => {
                parsed.malformed.push(MalformedEntry {
                    origin: raw.origin.clone(),
                    message: err.to_string(),
                });
                continue;
            }
        };
        for tree in trees {
            match resolve_document(tree, registry, &raw.origin) {
                Ok(doc) => parsed.documents.push(doc),
                Err(err) => parsed.malformed.push(MalformedEntry {
                    origin: raw.origin.clone(),
                    message: err.to_string(),
                }),
            }
        }
    }
    parsed
}

fn resolve_document(
    tree: serde_json::Value,
    registry: &KindRegistry,
    origin: &str,
) -> LatticeResult<DesiredDocument> {
    if !tree.is_object() {
        return Err(LatticeError::MalformedDocument {
            origin: origin.to_string(),
            message: "document is not a mapping".to_string(),
            location: None,
        });
    }
    if let Some((kind_name, body)) = codec::unwrap_manifest(&tree) {
        let kind = registry.resolve(&kind_name)?;
        return Ok(DesiredDocument::new(kind.clone(), body, origin));
    }
    let declared = tree.get("kind").and_then(|k| k.as_str()).map(String::from);
    let kind = match &declared {
        Some(name) => registry.resolve(name)?.clone(),
        None => {
            return Err(LatticeError::MalformedDocument {
                origin: origin.to_string(),
                message: "document does not declare a kind".to_string(),
                location: None,
            })
        }
    };
    // the kind key is envelope metadata, not part of the entity body
    let mut body = tree;
    if let serde_json::Value::Object(map) = &mut body {
        map.shift_remove("kind");
    }
    Ok(DesiredDocument::new(kind, body, origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_kind;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn registry() -> KindRegistry {
        KindRegistry::from_kinds(vec![
            test_kind("Route", "route", "routes"),
            test_kind("Backend", "backend", "backends"),
        ])
        .unwrap()
    }

    fn raw(content: &str, origin: &str) -> RawDocument {
        RawDocument {
            bytes: content.as_bytes().to_vec(),
            format: None,
            origin: origin.to_string(),
        }
    }

    #[test]
    fn file_arg_detects_urls() {
        assert!(matches!(
            DocumentSource::from_file_arg("https://lattice.io/routes.json"),
            DocumentSource::Url(_)
        ));
        assert!(matches!(
            DocumentSource::from_file_arg("routes.json"),
            DocumentSource::File(_)
        ));
    }

    #[test]
    fn inline_source_produces_one_document() {
        let source = DocumentSource::Inline("id: r1\nkind: route\n".to_string());
        let docs = source.produce(&NoFetch).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].origin, "inline");
    }

    #[test]
    fn data_source_folds_pairs() {
        let source = DocumentSource::Data(vec![
            "id=r1".to_string(),
            "frontend.domains.0=api.lattice.io".to_string(),
        ]);
        let docs = source.produce(&NoFetch).unwrap();
        let tree: serde_json::Value = serde_json::from_slice(&docs[0].bytes).unwrap();
        assert_eq!(
            tree,
            json!({"id": "r1", "frontend": {"domains": ["api.lattice.io"]}})
        );
    }

    #[test]
    fn url_source_without_fetcher_fails() {
        let source = DocumentSource::Url("https://lattice.io/x.json".to_string());
        assert!(source.produce(&NoFetch).is_err());
    }

    #[test]
    fn directory_discovery_is_lexicographic() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("c.yaml"), "x: 1").unwrap();

        let files = find_document_files(dir.path(), false).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["a.json", "b.json", "c.yaml"]);
    }

    #[test]
    fn directory_discovery_skips_unrecognized_extensions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.md"), "hello").unwrap();
        fs::write(dir.path().join("route.json"), "{}").unwrap();

        let files = find_document_files(dir.path(), false).unwrap();

        assert_eq!(files.len(), 1);
    }

    #[test]
    fn directory_discovery_non_recursive_stays_top_level() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/deep.json"), "{}").unwrap();
        fs::write(dir.path().join("top.json"), "{}").unwrap();

        let files = find_document_files(dir.path(), false).unwrap();
        assert_eq!(files.len(), 1);

        let files = find_document_files(dir.path(), true).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = find_document_files(Path::new("/definitely/not/here"), false).unwrap_err();
        assert!(matches!(err, LatticeError::DirectoryNotFound { .. }));
    }

    #[test]
    fn parse_source_reads_kind_from_body() {
        let parsed = parse_source(
            &[raw("{\"kind\": \"route\", \"id\": \"r1\"}", "a.json")],
            &registry(),
        );

        assert_eq!(parsed.documents.len(), 1);
        let doc = &parsed.documents[0];
        assert_eq!(doc.kind.kind, "Route");
        assert_eq!(doc.id, Some("r1".to_string()));
        // envelope key stripped from the body
        assert!(doc.body.get("kind").is_none());
    }

    #[test]
    fn parse_source_unwraps_armored_manifests() {
        let manifest = json!({
            "apiVersion": "proxy.lattice.io/v1",
            "kind": "Backend",
            "metadata": {"name": "payments"},
            "spec": {"id": "b1", "name": "payments"},
        });
        let parsed = parse_source(&[raw(&manifest.to_string(), "b.yaml")], &registry());

        assert_eq!(parsed.documents.len(), 1);
        assert_eq!(parsed.documents[0].kind.kind, "Backend");
        assert_eq!(parsed.documents[0].body, json!({"id": "b1", "name": "payments"}));
    }

    #[test]
    fn parse_source_flags_documents_without_kind() {
        let parsed = parse_source(&[raw("{\"id\": \"r1\"}", "stdin")], &registry());

        assert!(parsed.documents.is_empty());
        assert_eq!(parsed.malformed.len(), 1);
        assert!(parsed.malformed[0].message.contains("does not declare a kind"));
    }

    #[test]
    fn parse_source_collects_malformed_without_aborting() {
        let parsed = parse_source(
            &[
                raw("{\"kind\": \"route\", \"id\": \"ok\"}", "good.json"),
                raw("{not valid", "bad.json"),
                raw("{\"kind\": \"mystery\", \"id\": \"x\"}", "unknown.json"),
            ],
            &registry(),
        );

        assert_eq!(parsed.documents.len(), 1);
        assert_eq!(parsed.malformed.len(), 2);
        assert_eq!(parsed.malformed[0].origin, "bad.json");
        assert!(parsed.malformed[1].message.contains("unknown kind"));
    }

    #[test]
    fn parse_source_splits_multi_document_yaml() {
        let content = "---\nkind: route\nid: a\n---\nkind: backend\nid: b\n";
        let parsed = parse_source(&[raw(content, "all.yaml")], &registry());

        assert_eq!(parsed.documents.len(), 2);
        assert_eq!(parsed.documents[0].kind.kind, "Route");
        assert_eq!(parsed.documents[1].kind.kind, "Backend");
    }
}

//! Document codec
//!
//! Parses and serializes entity documents in JSON, YAML and
//! newline-delimited JSON. All documents normalize to a
//! `serde_json::Value` tree (mapping order preserved) so the rest of the
//! engine never cares which on-disk format a document came from.

mod armor;
mod path;

pub use armor::{is_manifest, unwrap_manifest, wrap_manifest};
pub use path::{apply_path_value, fold_data_pairs, parse_path, parse_scalar, PathStep};

use serde_json::Value;

use crate::error::{LatticeError, LatticeResult};

/// On-disk / wire document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocFormat {
    #[default]
    Json,
    Yaml,
    /// One JSON document per line, no surrounding array
    NdJson,
}

impl DocFormat {
    /// Infer the format from a file extension, if recognized
    pub fn from_extension(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".json") {
            Some(Self::Json)
        } else if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            Some(Self::Yaml)
        } else if lower.ends_with(".ndjson") {
            Some(Self::NdJson)
        } else {
            None
        }
    }

    /// Guess the format from content when no extension hint exists
    ///
    /// JSON documents start with `{` or `[`; everything else is read as
    /// YAML, which also accepts JSON-style scalars.
    pub fn sniff(content: &str) -> Self {
        let trimmed = content.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            Self::Json
        } else {
            Self::Yaml
        }
    }

    /// Canonical file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::NdJson => "ndjson",
        }
    }
}

fn malformed(origin: &str, message: String, location: Option<(usize, usize)>) -> LatticeError {
    LatticeError::MalformedDocument {
        origin: origin.to_string(),
        message,
        location,
    }
}

fn decode_json(content: &str, origin: &str) -> LatticeResult<Value> {
    serde_json::from_str(content)
        .map_err(|e| malformed(origin, e.to_string(), Some((e.line(), e.column()))))
}

fn decode_yaml(content: &str, origin: &str) -> LatticeResult<Value> {
    serde_yaml_ng::from_str(content).map_err(|e| {
        let location = e.location().map(|l| (l.line(), l.column()));
        malformed(origin, e.to_string(), location)
    })
}

/// Decode one document tree from raw bytes
pub fn decode_tree(bytes: &[u8], format: Option<DocFormat>, origin: &str) -> LatticeResult<Value> {
    let content = std::str::from_utf8(bytes)
        .map_err(|e| malformed(origin, format!("invalid utf-8: {e}"), None))?;
    match format.unwrap_or_else(|| DocFormat::sniff(content)) {
        DocFormat::Json | DocFormat::NdJson => decode_json(content, origin),
        DocFormat::Yaml => decode_yaml(content, origin),
    }
}

/// Split multi-document YAML on `---` separator lines
fn split_yaml_documents(content: &str) -> Vec<String> {
    let mut docs: Vec<String> = Vec::new();
    let mut current = String::new();
    for line in content.lines() {
        if line.trim_end() == "---" {
            docs.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    docs.push(current);
    docs.into_iter().filter(|d| !d.trim().is_empty()).collect()
}

/// Decode every document in a payload
///
/// A JSON array flattens into its elements; a YAML stream splits on
/// `---`; NDJSON yields one document per non-empty line. A payload with
/// a single document decodes to a one-element vec.
pub fn decode_documents(
    bytes: &[u8],
    format: Option<DocFormat>,
    origin: &str,
) -> LatticeResult<Vec<Value>> {
    let content = std::str::from_utf8(bytes)
        .map_err(|e| malformed(origin, format!("invalid utf-8: {e}"), None))?;
    match format.unwrap_or_else(|| DocFormat::sniff(content)) {
        DocFormat::Json => match decode_json(content, origin)? {
            Value::Array(items) => Ok(items),
            doc => Ok(vec![doc]),
        },
        DocFormat::Yaml => split_yaml_documents(content)
            .iter()
            .map(|doc| decode_yaml(doc, origin))
            .collect(),
        DocFormat::NdJson => content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| decode_json(line, origin))
            .collect(),
    }
}

/// Encode one document tree
pub fn encode_tree(value: &Value, format: DocFormat) -> LatticeResult<String> {
    match format {
        DocFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        DocFormat::Yaml => Ok(serde_yaml_ng::to_string(value)?),
        DocFormat::NdJson => Ok(serde_json::to_string(value)?),
    }
}

/// Encode a sequence of documents into one payload
pub fn encode_documents(docs: &[Value], format: DocFormat) -> LatticeResult<String> {
    match format {
        DocFormat::Json => Ok(serde_json::to_string_pretty(&Value::Array(docs.to_vec()))?),
        DocFormat::Yaml => {
            let mut out = String::new();
            for doc in docs {
                out.push_str("---\n");
                out.push_str(&serde_yaml_ng::to_string(doc)?);
            }
            Ok(out)
        }
        DocFormat::NdJson => {
            let mut out = String::new();
            for doc in docs {
                out.push_str(&serde_json::to_string(doc)?);
                out.push('\n');
            }
            Ok(out)
        }
    }
}

/// Merge a sparse patch tree onto a base tree
///
/// Objects merge key-by-key, a `null` patch value removes the key, and
/// any non-object patch value replaces the base wholesale (merge-patch
/// semantics).
pub fn merge_values(base: &mut Value, patch: &Value) {
    match patch {
        Value::Object(patch_map) => {
            if !base.is_object() {
                *base = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(base_map) = base {
                for (key, patch_value) in patch_map {
                    if patch_value.is_null() {
                        base_map.shift_remove(key);
                    } else {
                        merge_values(
                            base_map.entry(key.clone()).or_insert(Value::Null),
                            patch_value,
                        );
                    }
                }
            }
        }
        _ => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_from_extension() {
        assert_eq!(DocFormat::from_extension("route.json"), Some(DocFormat::Json));
        assert_eq!(DocFormat::from_extension("route.yaml"), Some(DocFormat::Yaml));
        assert_eq!(DocFormat::from_extension("route.YML"), Some(DocFormat::Yaml));
        assert_eq!(DocFormat::from_extension("dump.ndjson"), Some(DocFormat::NdJson));
        assert_eq!(DocFormat::from_extension("readme.md"), None);
    }

    #[test]
    fn sniff_json_vs_yaml() {
        assert_eq!(DocFormat::sniff("  {\"a\": 1}"), DocFormat::Json);
        assert_eq!(DocFormat::sniff("[1, 2]"), DocFormat::Json);
        assert_eq!(DocFormat::sniff("a: 1"), DocFormat::Yaml);
    }

    #[test]
    fn decode_json_tree() {
        let tree = decode_tree(b"{\"id\": \"r1\", \"n\": 2}", None, "test").unwrap();
        assert_eq!(tree, json!({"id": "r1", "n": 2}));
    }

    #[test]
    fn decode_yaml_tree() {
        let tree = decode_tree(b"id: r1\nenabled: true\n", None, "test").unwrap();
        assert_eq!(tree, json!({"id": "r1", "enabled": true}));
    }

    #[test]
    fn decode_error_carries_origin_and_location() {
        let err = decode_tree(b"{\"id\": }", Some(DocFormat::Json), "bad.json").unwrap_err();
        match err {
            crate::error::LatticeError::MalformedDocument {
                origin, location, ..
            } => {
                assert_eq!(origin, "bad.json");
                assert!(location.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_documents_flattens_json_array() {
        let docs = decode_documents(b"[{\"id\": \"a\"}, {\"id\": \"b\"}]", None, "test").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1], json!({"id": "b"}));
    }

    #[test]
    fn decode_documents_splits_yaml_stream() {
        let content = b"---\nid: a\n---\nid: b\n";
        let docs = decode_documents(content, Some(DocFormat::Yaml), "test").unwrap();
        assert_eq!(docs, vec![json!({"id": "a"}), json!({"id": "b"})]);
    }

    #[test]
    fn decode_documents_single_yaml_without_separator() {
        let docs = decode_documents(b"id: only\n", Some(DocFormat::Yaml), "test").unwrap();
        assert_eq!(docs, vec![json!({"id": "only"})]);
    }

    #[test]
    fn decode_documents_ndjson_lines() {
        let content = b"{\"id\": \"a\"}\n\n{\"id\": \"b\"}\n";
        let docs = decode_documents(content, Some(DocFormat::NdJson), "test").unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn encode_documents_ndjson_one_per_line() {
        let docs = vec![json!({"id": "a"}), json!({"id": "b"})];
        let out = encode_documents(&docs, DocFormat::NdJson).unwrap();
        assert_eq!(out, "{\"id\":\"a\"}\n{\"id\":\"b\"}\n");
    }

    #[test]
    fn encode_then_decode_yaml_stream_round_trips() {
        let docs = vec![json!({"id": "a", "w": 1}), json!({"id": "b"})];
        let out = encode_documents(&docs, DocFormat::Yaml).unwrap();
        let back = decode_documents(out.as_bytes(), Some(DocFormat::Yaml), "test").unwrap();
        assert_eq!(back, docs);
    }

    #[test]
    fn encode_preserves_key_order() {
        let tree = json!({"zebra": 1, "alpha": 2, "mid": 3});
        let out = encode_tree(&tree, DocFormat::Json).unwrap();
        let zebra = out.find("zebra").unwrap();
        let alpha = out.find("alpha").unwrap();
        assert!(zebra < alpha, "insertion order must survive encoding");
    }

    #[test]
    fn merge_values_merges_nested_objects() {
        let mut base = json!({"a": {"x": 1, "y": 2}, "b": 1});
        merge_values(&mut base, &json!({"a": {"y": 3, "z": 4}}));
        assert_eq!(base, json!({"a": {"x": 1, "y": 3, "z": 4}, "b": 1}));
    }

    #[test]
    fn merge_values_null_removes_key() {
        let mut base = json!({"a": 1, "b": 2});
        merge_values(&mut base, &json!({"b": null}));
        assert_eq!(base, json!({"a": 1}));
    }

    #[test]
    fn merge_values_replaces_arrays_wholesale() {
        let mut base = json!({"targets": [1, 2, 3]});
        merge_values(&mut base, &json!({"targets": [9]}));
        assert_eq!(base, json!({"targets": [9]}));
    }
}

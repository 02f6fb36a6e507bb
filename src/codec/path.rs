//! Path-value construction
//!
//! Implements the `--data path=value` argument syntax: a dotted path with
//! numeric segments addressing sequence indices (`plugins.0.enabled=true`)
//! applied onto a document tree, creating intermediate nodes as needed.

use serde_json::Value;

use crate::error::{LatticeError, LatticeResult};

/// One step of a parsed data path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// Mapping key
    Key(String),
    /// Sequence index
    Index(usize),
}

/// Parse a dotted path into steps
///
/// A segment made entirely of ASCII digits is always a sequence index,
/// never a mapping key. Mapping keys that look numeric are therefore not
/// addressable through this syntax, which is the documented trade-off.
pub fn parse_path(path: &str) -> LatticeResult<Vec<PathStep>> {
    if path.is_empty() {
        return Err(LatticeError::InvalidPath {
            path: path.to_string(),
            message: "path is empty".to_string(),
        });
    }
    path.split('.')
        .map(|segment| {
            if segment.is_empty() {
                Err(LatticeError::InvalidPath {
                    path: path.to_string(),
                    message: "empty path segment".to_string(),
                })
            } else if segment.bytes().all(|b| b.is_ascii_digit()) {
                segment
                    .parse::<usize>()
                    .map(PathStep::Index)
                    .map_err(|e| LatticeError::InvalidPath {
                        path: path.to_string(),
                        message: e.to_string(),
                    })
            } else {
                Ok(PathStep::Key(segment.to_string()))
            }
        })
        .collect()
}

fn container_for(step: &PathStep) -> Value {
    match step {
        PathStep::Key(_) => Value::Object(serde_json::Map::new()),
        PathStep::Index(_) => Value::Array(Vec::new()),
    }
}

/// Apply one path/value pair onto a tree
///
/// Intermediate mappings and sequences are created on demand; sequences
/// extend to the required index with null-filled gaps. A scalar already
/// sitting where a container is needed is replaced.
pub fn apply_path_value(root: &mut Value, steps: &[PathStep], value: Value) {
    let Some((step, rest)) = steps.split_first() else {
        *root = value;
        return;
    };
    match step {
        PathStep::Key(key) => {
            if !root.is_object() {
                *root = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(map) = root {
                let slot = map.entry(key.clone()).or_insert_with(|| {
                    rest.first().map(container_for).unwrap_or(Value::Null)
                });
                apply_path_value(slot, rest, value);
            }
        }
        PathStep::Index(index) => {
            if !root.is_array() {
                *root = Value::Array(Vec::new());
            }
            if let Value::Array(items) = root {
                while items.len() <= *index {
                    items.push(Value::Null);
                }
                apply_path_value(&mut items[*index], rest, value);
            }
        }
    }
}

/// Parse a raw `value` literal into a scalar
///
/// Quoted values are taken as strings with the quotes stripped; unquoted
/// values are read as JSON scalars when they parse as one (`1`, `true`,
/// `null`), and fall back to plain strings otherwise.
pub fn parse_scalar(raw: &str) -> Value {
    for quote in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Value::String(raw[1..raw.len() - 1].to_string());
        }
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}

/// Fold a list of `path=value` pairs into one document tree
///
/// Pairs apply in the order given, so later pairs override earlier ones
/// on overlapping paths.
pub fn fold_data_pairs(pairs: &[String]) -> LatticeResult<Value> {
    let mut root = Value::Object(serde_json::Map::new());
    for pair in pairs {
        let Some((path, raw_value)) = pair.split_once('=') else {
            return Err(LatticeError::InvalidPath {
                path: pair.clone(),
                message: "expected PATH=VALUE".to_string(),
            });
        };
        let steps = parse_path(path)?;
        apply_path_value(&mut root, &steps, parse_scalar(raw_value));
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_path_splits_keys_and_indices() {
        let steps = parse_path("a.b.0.c").unwrap();
        assert_eq!(
            steps,
            vec![
                PathStep::Key("a".to_string()),
                PathStep::Key("b".to_string()),
                PathStep::Index(0),
                PathStep::Key("c".to_string()),
            ]
        );
    }

    #[test]
    fn numeric_segments_are_always_indices() {
        let steps = parse_path("headers.0").unwrap();
        assert_eq!(steps[1], PathStep::Index(0));
        // mixed alphanumerics stay keys
        let steps = parse_path("headers.x2").unwrap();
        assert_eq!(steps[1], PathStep::Key("x2".to_string()));
    }

    #[test]
    fn parse_path_rejects_empty_segment() {
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("").is_err());
    }

    #[test]
    fn fold_builds_nested_tree() {
        let tree = fold_data_pairs(&pairs(&["a.0.b=1", "a.0.c=2"])).unwrap();
        assert_eq!(tree, json!({"a": [{"b": 1, "c": 2}]}));
    }

    #[test]
    fn fold_extends_sequence_with_null_gaps() {
        let tree = fold_data_pairs(&pairs(&["items.2=x"])).unwrap();
        assert_eq!(tree, json!({"items": [null, null, "x"]}));
    }

    #[test]
    fn fold_later_pairs_override_earlier() {
        let tree = fold_data_pairs(&pairs(&["name=first", "name=second"])).unwrap();
        assert_eq!(tree, json!({"name": "second"}));
    }

    #[test]
    fn fold_rejects_pair_without_equals() {
        assert!(fold_data_pairs(&pairs(&["justapath"])).is_err());
    }

    #[test]
    fn scalar_parsing_recognizes_json_scalars() {
        assert_eq!(parse_scalar("1"), json!(1));
        assert_eq!(parse_scalar("true"), json!(true));
        assert_eq!(parse_scalar("null"), json!(null));
        assert_eq!(parse_scalar("hello"), json!("hello"));
        assert_eq!(parse_scalar("1.5"), json!(1.5));
    }

    #[test]
    fn scalar_parsing_strips_quotes() {
        assert_eq!(parse_scalar("'123'"), json!("123"));
        assert_eq!(parse_scalar("\"true\""), json!("true"));
    }

    #[test]
    fn apply_replaces_scalar_with_container_when_needed() {
        let mut root = json!({"a": 1});
        let steps = parse_path("a.b").unwrap();
        apply_path_value(&mut root, &steps, json!(2));
        assert_eq!(root, json!({"a": {"b": 2}}));
    }

    #[test]
    fn deep_mixed_path() {
        let tree = fold_data_pairs(&pairs(&[
            "frontend.domains.0=api.lattice.io",
            "frontend.domains.1=www.lattice.io",
            "backend.targets.0.port=8080",
        ]))
        .unwrap();
        assert_eq!(
            tree,
            json!({
                "frontend": {"domains": ["api.lattice.io", "www.lattice.io"]},
                "backend": {"targets": [{"port": 8080}]},
            })
        );
    }
}

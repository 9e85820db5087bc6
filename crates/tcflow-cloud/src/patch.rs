//! Structural patch translator
//!
//! Turns a full desired document into the sparse partial-update document that
//! "update metadata" style APIs accept. The two documents are diffed into a
//! JSON-Patch operation list, then the operations are folded into a nested
//! map holding only the changed branches.

use crate::error::{CloudError, Result};
use json_patch::PatchOperation;
use serde_json::{Map, Value};

/// Index settings the backend echoes back as strings
pub const NUMERIC_STRING_SETTINGS: &[&str] = &["index.number_of_replicas", "index.number_of_shards"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    Add,
    Remove,
    Replace,
}

/// One structural change between two documents
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOp {
    pub kind: PatchKind,
    /// Decoded path segments, root first
    pub path: Vec<String>,
    /// New value; `Null` for removals
    pub value: Value,
}

impl PatchOp {
    fn from_operation(op: PatchOperation) -> Result<Self> {
        let (kind, pointer, value) = match op {
            PatchOperation::Add(add) => (PatchKind::Add, add.path.to_string(), add.value),
            PatchOperation::Replace(rep) => (PatchKind::Replace, rep.path.to_string(), rep.value),
            PatchOperation::Remove(rem) => (PatchKind::Remove, rem.path.to_string(), Value::Null),
            other => {
                return Err(CloudError::MalformedDocument(format!(
                    "unexpected patch operation: {:?}",
                    other
                )));
            }
        };
        Ok(Self {
            kind,
            path: split_pointer(&pointer),
            value,
        })
    }

    /// JSON pointer form of the path
    pub fn pointer(&self) -> String {
        self.path
            .iter()
            .map(|s| format!("/{}", s.replace('~', "~0").replace('/', "~1")))
            .collect()
    }
}

/// Split a JSON pointer into decoded segments, dropping the leading empty one
fn split_pointer(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

fn ensure_object(doc: &Value, side: &str) -> Result<()> {
    if doc.is_object() {
        Ok(())
    } else {
        Err(CloudError::MalformedDocument(format!(
            "{} document must be a JSON object",
            side
        )))
    }
}

/// Parse a document, rejecting anything that is not a JSON object
pub fn parse_document(text: &str) -> Result<Value> {
    let doc: Value = serde_json::from_str(text)
        .map_err(|e| CloudError::MalformedDocument(e.to_string()))?;
    ensure_object(&doc, "input")?;
    Ok(doc)
}

/// Ordered list of changes turning `old` into `new`
///
/// Arrays are compared element by element, so a reordering shows up as
/// per-index replacements. [`build_partial_update`] widens those back to the
/// whole array before folding.
pub fn diff(old: &Value, new: &Value) -> Result<Vec<PatchOp>> {
    ensure_object(old, "old")?;
    ensure_object(new, "new")?;
    json_patch::diff(old, new)
        .0
        .into_iter()
        .map(PatchOp::from_operation)
        .collect()
}

/// Fold operations into a nested sparse document
///
/// Intermediate maps are created on demand along each path and the leaf is
/// overwritten. Removals set the leaf to `null`.
pub fn fold(ops: &[PatchOp]) -> Value {
    let mut root = Map::new();
    for op in ops {
        set_path(&mut root, &op.path, op.value.clone());
    }
    Value::Object(root)
}

fn set_path(node: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        node.insert(head.clone(), value);
        return;
    }
    let child = node
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(map) = child {
        set_path(map, rest, value);
    }
}

/// Path and value of the first array `path` walks into inside `doc`
fn enclosing_array(doc: &Value, path: &[String]) -> Option<(Vec<String>, Value)> {
    let mut node = doc;
    for (depth, segment) in path.iter().enumerate() {
        match node {
            Value::Array(_) => return Some((path[..depth].to_vec(), node.clone())),
            Value::Object(map) => node = map.get(segment)?,
            _ => return None,
        }
    }
    None
}

/// Replace element-level operations with one replacement of the whole array
///
/// Index-keyed maps are not arrays to the backend, and two removals at the
/// same index would fold into one.
fn widen_array_ops(ops: Vec<PatchOp>, new: &Value) -> Vec<PatchOp> {
    let mut widened: Vec<PatchOp> = Vec::with_capacity(ops.len());
    for op in ops {
        let op = match enclosing_array(new, &op.path) {
            Some((path, value)) => PatchOp {
                kind: PatchKind::Replace,
                path,
                value,
            },
            None => op,
        };
        if !widened.contains(&op) {
            widened.push(op);
        }
    }
    widened
}

/// Sparse document holding exactly what changed between `old` and `new`
///
/// Objects are diffed key by key; an array that changed in any way is sent
/// whole.
pub fn build_partial_update(old: &Value, new: &Value) -> Result<Value> {
    let ops = widen_array_ops(diff(old, new)?, new);
    tracing::debug!(operations = ops.len(), "computed structural diff");
    Ok(fold(&ops))
}

/// Like [`build_partial_update`], coercing numeric-string settings on the old side first
pub fn build_partial_update_coerced(old: &Value, new: &Value, keys: &[&str]) -> Result<Value> {
    let mut old = old.clone();
    coerce_numeric_strings(&mut old, keys);
    build_partial_update(&old, new)
}

/// Turn string values under `keys` into integers, at any depth
///
/// Values that do not parse as integers are left alone.
pub fn coerce_numeric_strings(doc: &mut Value, keys: &[&str]) {
    match doc {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                let parsed = match value {
                    Value::String(s) if keys.contains(&key.as_str()) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                if let Some(n) = parsed {
                    *value = Value::from(n);
                    continue;
                }
                coerce_numeric_strings(value, keys);
            }
        }
        Value::Array(items) => {
            for item in items {
                coerce_numeric_strings(item, keys);
            }
        }
        _ => {}
    }
}

/// Apply a sparse update onto `base`
///
/// Objects are merged recursively, `null` deletes the key, anything else
/// replaces the leaf.
pub fn merge_partial_update(base: &mut Value, update: &Value) {
    let Value::Object(patch) = update else {
        *base = update.clone();
        return;
    };
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    if let Value::Object(target) = base {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_partial_update(
                    target.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_documents_yield_empty_update() {
        let doc = json!({
            "settings": {"index.number_of_replicas": 1, "index.refresh_interval": "1s"},
            "mappings": {"properties": {"title": {"type": "text"}}},
            "aliases": ["a", "b"]
        });
        assert_eq!(build_partial_update(&doc, &doc).unwrap(), json!({}));
    }

    #[test]
    fn test_replica_count_coercion() {
        let old = json!({"settings": {"index.number_of_replicas": "1"}});
        let new = json!({"settings": {"index.number_of_replicas": 2}});

        let mut coerced = old.clone();
        coerce_numeric_strings(&mut coerced, NUMERIC_STRING_SETTINGS);
        let ops = diff(&coerced, &new).unwrap();
        assert_eq!(
            ops,
            vec![PatchOp {
                kind: PatchKind::Replace,
                path: vec!["settings".into(), "index.number_of_replicas".into()],
                value: json!(2),
            }]
        );

        let update = build_partial_update_coerced(&old, &new, NUMERIC_STRING_SETTINGS).unwrap();
        assert_eq!(update, json!({"settings": {"index.number_of_replicas": 2}}));
    }

    #[test]
    fn test_coercion_removes_spurious_drift() {
        let old = json!({"settings": {"index.number_of_shards": "3"}});
        let new = json!({"settings": {"index.number_of_shards": 3}});
        let update = build_partial_update_coerced(&old, &new, NUMERIC_STRING_SETTINGS).unwrap();
        assert_eq!(update, json!({}));
    }

    #[test]
    fn test_add_and_remove_fold() {
        let old = json!({"settings": {"a": 1, "b": 2}});
        let new = json!({"settings": {"a": 1, "c": {"d": true}}});
        let update = build_partial_update(&old, &new).unwrap();
        assert_eq!(update, json!({"settings": {"b": null, "c": {"d": true}}}));
    }

    #[test]
    fn test_fold_creates_intermediate_maps() {
        let ops = vec![
            PatchOp {
                kind: PatchKind::Add,
                path: vec!["a".into(), "b".into(), "c".into()],
                value: json!(1),
            },
            PatchOp {
                kind: PatchKind::Replace,
                path: vec!["a".into(), "x".into()],
                value: json!("y"),
            },
        ];
        assert_eq!(fold(&ops), json!({"a": {"b": {"c": 1}, "x": "y"}}));
    }

    #[test]
    fn test_pointer_escaping() {
        let op = PatchOp {
            kind: PatchKind::Add,
            path: vec!["a/b".into(), "c~d".into()],
            value: json!(1),
        };
        assert_eq!(op.pointer(), "/a~1b/c~0d");
        assert_eq!(split_pointer(&op.pointer()), op.path);
    }

    #[test]
    fn test_round_trip_merge() {
        let old = json!({
            "settings": {"index.number_of_replicas": 1, "index.max_result_window": 10000},
            "mappings": {"properties": {"title": {"type": "text"}}}
        });
        let new = json!({
            "settings": {"index.number_of_replicas": 2},
            "mappings": {"properties": {"title": {"type": "text"}, "tag": {"type": "keyword"}}}
        });
        let update = build_partial_update(&old, &new).unwrap();

        let mut merged = old.clone();
        merge_partial_update(&mut merged, &update);
        assert_eq!(merged, new);
    }

    #[test]
    fn test_round_trip_merge_with_arrays() {
        let cases = [
            // replace one element
            (json!({"a": [1, 2]}), json!({"a": [1, 3]})),
            // append
            (json!({"a": [1, 2]}), json!({"a": [1, 2, 3]})),
            // shrink by two
            (json!({"a": [1, 2, 3]}), json!({"a": [1]})),
            // array nested under objects, next to an unchanged key
            (
                json!({"mappings": {"properties": {"title": {"type": "text", "copy_to": ["all"]}}}}),
                json!({"mappings": {"properties": {"title": {"type": "text", "copy_to": ["all", "body"]}}}}),
            ),
            // objects inside an array
            (
                json!({"aliases": [{"name": "a"}, {"name": "b"}]}),
                json!({"aliases": [{"name": "a", "filter": {"term": {"x": 1}}}]}),
            ),
        ];
        for (old, new) in cases {
            let update = build_partial_update(&old, &new).unwrap();
            let mut merged = old.clone();
            merge_partial_update(&mut merged, &update);
            assert_eq!(merged, new, "update {} from {}", update, old);
        }
    }

    #[test]
    fn test_changed_array_is_sent_whole() {
        let old = json!({"settings": {"index.number_of_replicas": 1}, "a": [1, 2, 3]});
        let new = json!({"settings": {"index.number_of_replicas": 1}, "a": [1]});
        let update = build_partial_update(&old, &new).unwrap();
        assert_eq!(update, json!({"a": [1]}));

        // element-level diff is unchanged
        let ops = diff(&old, &new).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| op.kind == PatchKind::Remove));
    }

    #[test]
    fn test_malformed_documents() {
        let err = build_partial_update(&json!([1, 2]), &json!({})).unwrap_err();
        assert!(matches!(err, CloudError::MalformedDocument(_)));

        let err = parse_document("{not json").unwrap_err();
        assert!(matches!(err, CloudError::MalformedDocument(_)));

        let err = parse_document("\"scalar\"").unwrap_err();
        assert!(matches!(err, CloudError::MalformedDocument(_)));
    }
}

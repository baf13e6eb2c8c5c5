//! State tree primitives.
//!
//! The canonical state is a JSON object whose top-level keys keep their
//! insertion order. Remote mirrors are kept up to date with shallow diffs:
//! a diff holds only the top-level keys whose value changed, so merging it
//! onto the previous snapshot yields the next one.
//!
//! Diffs never carry deletions. A key that disappears from the state simply
//! stops being reported.

use serde_json::{Map, Value};

/// The full application state: top-level key to value, in insertion order.
pub type StateTree = Map<String, Value>;

/// A shallow diff between two [`StateTree`] snapshots.
pub type StateDiff = Map<String, Value>;

/// Compute the keys of `new` whose value differs from `old`.
///
/// Keys are visited in the insertion order of `new`. Keys present only in
/// `old` are not reported.
#[must_use]
pub fn shallow_diff(old: &StateTree, new: &StateTree) -> StateDiff {
    new.iter()
        .filter(|(key, value)| old.get(key.as_str()) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Merge a diff onto a mirror in place.
pub fn merge_diff(target: &mut StateTree, diff: &StateDiff) {
    for (key, value) in diff {
        target.insert(key.clone(), value.clone());
    }
}

/// Select the named sub-tree of `state`.
///
/// Missing sub-trees (and falsy ones such as `null`, `false`, `0` or `""`)
/// are replaced by an empty object, never an error.
#[must_use]
pub fn select_substore(state: &StateTree, key: &str) -> Value {
    match state.get(key) {
        Some(value) if !is_falsy(value) => value.clone(),
        _ => Value::Object(Map::new()),
    }
}

/// Whether a snapshot carries anything worth pushing.
///
/// Objects and arrays count their entries and strings their characters.
/// Scalars have no keys and are never pushed after the initial snapshot.
#[must_use]
pub fn has_keys(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0 || f.is_nan()),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Convert a JSON value into a state tree.
///
/// Returns `None` when the value is not an object.
#[must_use]
pub fn into_tree(value: Value) -> Option<StateTree> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

//! A generic reducer over top-level state keys.
//!
//! Applications embedding the bridge normally bring their own [`Reducer`];
//! this one lets the owner run standalone and is what the CLI uses.
//!
//! | Action type | Payload | Effect |
//! |-------------|---------|--------|
//! | `state/set` | `{key, value}` | replace a top-level key |
//! | `state/merge` | `{key, value}` | shallow-merge an object into a top-level object |
//! | `state/remove` | `{key}` | remove a top-level key |
//! | `state/replace` | `{state}` | replace the whole tree |
//!
//! Anything else, including malformed payloads, leaves the state unchanged.

use serde_json::Value;

use super::{Action, Reducer};
use crate::state::StateTree;

/// Action type replacing a top-level key.
pub const SET: &str = "state/set";
/// Action type shallow-merging into a top-level object.
pub const MERGE: &str = "state/merge";
/// Action type removing a top-level key.
pub const REMOVE: &str = "state/remove";
/// Action type replacing the whole tree.
pub const REPLACE: &str = "state/replace";

/// The built-in key/value reducer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinReducer;

impl Reducer for BuiltinReducer {
    fn reduce(&self, state: &StateTree, action: &Action) -> StateTree {
        let payload = &action.payload;
        let key = payload.get("key").and_then(Value::as_str);

        match (action.kind.as_str(), key) {
            (SET, Some(key)) => {
                let mut next = state.clone();
                next.insert(
                    key.to_string(),
                    payload.get("value").cloned().unwrap_or(Value::Null),
                );
                next
            }
            (MERGE, Some(key)) => {
                let Some(Value::Object(patch)) = payload.get("value") else {
                    tracing::debug!("{MERGE} ignored: value is not an object");
                    return state.clone();
                };
                let mut next = state.clone();
                let entry = next
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Object(serde_json::Map::new()));
                match entry {
                    Value::Object(target) => {
                        for (k, v) in patch {
                            target.insert(k.clone(), v.clone());
                        }
                    }
                    other => *other = Value::Object(patch.clone()),
                }
                next
            }
            (REMOVE, Some(key)) => {
                let mut next = state.clone();
                next.shift_remove(key);
                next
            }
            (REPLACE, _) => match payload.get("state") {
                Some(Value::Object(tree)) => tree.clone(),
                _ => state.clone(),
            },
            _ => state.clone(),
        }
    }
}

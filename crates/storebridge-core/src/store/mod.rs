//! The canonical state container.
//!
//! A [`Store`] owns the state tree, the reducer that produces the next tree
//! from an [`Action`], and the listeners notified after every dispatch. It is
//! constructed explicitly by the owning process and handed to the
//! [`Bridge`](crate::bridge::Bridge); there is no global instance.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use storebridge_core::store::{Action, BuiltinReducer, Store};
//!
//! let mut store = Store::new(BuiltinReducer);
//! store.dispatch(Action::with_payload("state/set", json!({"key": "a", "value": 1})));
//! assert_eq!(store.get_state()["a"], json!(1));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state::StateTree;

pub mod reducer;

pub use reducer::BuiltinReducer;

/// A serializable request to mutate the state.
///
/// Serialized as `{"type": ..., "payload": ...}`; any other top-level fields
/// are kept in `extra` and reach the reducer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action type, e.g. `"settings/setTheme"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Action payload
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    /// Additional fields carried alongside the payload
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Action {
    /// Create an action without a payload.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
            extra: Map::new(),
        }
    }

    /// Create an action with a payload.
    #[must_use]
    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            payload,
            ..Self::new(kind)
        }
    }
}

/// Produces the next state from the current state and an action.
///
/// Reducers must not fail: actions they do not understand should return the
/// state unchanged.
pub trait Reducer: Send {
    /// Compute the next state.
    fn reduce(&self, state: &StateTree, action: &Action) -> StateTree;
}

impl<F> Reducer for F
where
    F: Fn(&StateTree, &Action) -> StateTree + Send,
{
    fn reduce(&self, state: &StateTree, action: &Action) -> StateTree {
        self(state, action)
    }
}

/// What a listener wants after being notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    /// Keep receiving notifications
    Keep,
    /// Unsubscribe this listener
    Remove,
}

/// Observer of store mutations.
pub trait StoreListener: Send {
    /// Called once after every dispatch with the new state.
    fn on_change(&mut self, state: &StateTree) -> ListenerStatus;
}

impl<F> StoreListener for F
where
    F: FnMut(&StateTree) -> ListenerStatus + Send,
{
    fn on_change(&mut self, state: &StateTree) -> ListenerStatus {
        self(state)
    }
}

/// Handle returned by [`Store::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// The canonical state container.
pub struct Store {
    state: StateTree,
    reducer: Box<dyn Reducer>,
    listeners: Vec<(ListenerId, Box<dyn StoreListener>)>,
    next_listener_id: u64,
    dispatch_count: u64,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.state.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.len())
            .field("dispatch_count", &self.dispatch_count)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Create a store with an empty state.
    pub fn new(reducer: impl Reducer + 'static) -> Self {
        Self::with_state(reducer, StateTree::new())
    }

    /// Create a store with an initial state.
    pub fn with_state(reducer: impl Reducer + 'static, state: StateTree) -> Self {
        Self {
            state,
            reducer: Box::new(reducer),
            listeners: Vec::new(),
            next_listener_id: 0,
            dispatch_count: 0,
        }
    }

    /// Get the current state.
    #[must_use]
    pub fn get_state(&self) -> &StateTree {
        &self.state
    }

    /// Number of dispatches applied so far.
    #[must_use]
    pub fn dispatch_count(&self) -> u64 {
        self.dispatch_count
    }

    /// Apply an action and notify every listener in subscription order.
    ///
    /// Listeners returning [`ListenerStatus::Remove`] are dropped and their
    /// ids returned.
    pub fn dispatch(&mut self, action: Action) -> Vec<ListenerId> {
        self.state = self.reducer.reduce(&self.state, &action);
        self.dispatch_count += 1;

        let state = &self.state;
        let mut removed = Vec::new();
        self.listeners.retain_mut(|(id, listener)| {
            let keep = listener.on_change(state) == ListenerStatus::Keep;
            if !keep {
                removed.push(*id);
            }
            keep
        });
        removed
    }

    /// Register a listener, called after every subsequent dispatch.
    pub fn subscribe(&mut self, listener: impl StoreListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Whether a listener is still registered.
    #[must_use]
    pub fn is_subscribed(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|(listener_id, _)| *listener_id == id)
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

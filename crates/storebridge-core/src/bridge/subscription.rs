//! Remote window subscriptions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::Message;
use crate::state::{self, StateTree};
use crate::store::{ListenerStatus, StoreListener};

/// Identifies one remote window connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(uuid::Uuid);

impl WindowId {
    /// Allocate a fresh window id.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell windows apart in logs.
        let id = self.0.simple().to_string();
        f.write_str(&id[..8])
    }
}

/// The owner's handle for pushing messages to one remote window.
///
/// Cloning is cheap; every clone feeds the same connection.
#[derive(Debug, Clone)]
pub struct RemoteSender {
    window: WindowId,
    tx: mpsc::UnboundedSender<Message>,
}

impl RemoteSender {
    /// Wrap an outbound queue for `window`.
    #[must_use]
    pub fn new(window: WindowId, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { window, tx }
    }

    /// Create a sender for a new window together with the receiving end
    /// of its outbound queue.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(WindowId::new(), tx), rx)
    }

    /// The window this sender pushes to.
    #[must_use]
    pub fn window(&self) -> WindowId {
        self.window
    }

    /// Queue a message for the remote window.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the window's connection is gone.
    pub fn send(&self, message: Message) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::ChannelClosed)
    }

    /// Whether the connection behind this sender has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One remote window's registration for state updates.
///
/// Whole-store subscriptions remember the last state they sent and push
/// shallow diffs against it. Sub-tree subscriptions always push their full
/// slice.
#[derive(Debug)]
pub struct Subscription {
    sender: RemoteSender,
    substore: Option<String>,
    last_sent: StateTree,
}

impl Subscription {
    /// Create a subscription that has not sent anything yet.
    #[must_use]
    pub fn new(sender: RemoteSender, substore: Option<String>) -> Self {
        Self {
            sender,
            substore,
            last_sent: StateTree::new(),
        }
    }

    /// The sub-tree this subscription follows, if any.
    #[must_use]
    pub fn substore(&self) -> Option<&str> {
        self.substore.as_deref()
    }

    /// The window this subscription pushes to.
    #[must_use]
    pub fn window(&self) -> WindowId {
        self.sender.window()
    }

    /// Compute what this subscription should receive for `state`.
    ///
    /// For a whole-store subscription this advances the remembered state,
    /// so calling it twice with the same state yields an empty diff the
    /// second time.
    pub fn snapshot(&mut self, state: &StateTree) -> Value {
        if let Some(key) = &self.substore {
            return state::select_substore(state, key);
        }

        let diff = state::shallow_diff(&self.last_sent, state);
        self.last_sent = state.clone();
        Value::Object(diff)
    }

    /// Push the first snapshot, whatever its contents.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the window is gone.
    pub fn send_initial(&mut self, state: &StateTree) -> Result<()> {
        let snapshot = self.snapshot(state);
        self.sender.send(Message::StateChange(snapshot))
    }
}

impl StoreListener for Subscription {
    fn on_change(&mut self, state: &StateTree) -> ListenerStatus {
        let snapshot = self.snapshot(state);
        if !state::has_keys(&snapshot) {
            return ListenerStatus::Keep;
        }

        tracing::trace!(window = %self.window(), "pushing state change: {snapshot}");
        match self.sender.send(Message::StateChange(snapshot)) {
            Ok(()) => ListenerStatus::Keep,
            Err(e) => {
                tracing::debug!(window = %self.window(), "dropping subscription: {e}");
                ListenerStatus::Remove
            }
        }
    }
}

//! State sync bridge between the owning process and remote windows.
//!
//! The [`Bridge`] owns the [`Store`] and is the only code that touches it.
//! Everything else talks to it through a [`BridgeHandle`], which posts
//! events onto a single run queue. The run loop handles one event at a time,
//! so store mutations and the pushes they trigger are strictly sequential.
//!
//! ## Flow
//!
//! ```text
//! remote window ──subscribeStore──▶ register Subscription, push first snapshot
//! remote window ──dispatchAction──▶ defer Dispatch to the next turn
//! next turn     ──Dispatch────────▶ Store::dispatch ─▶ every Subscription
//!                                                      pushes non-empty stateChange
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use storebridge_core::bridge::{Bridge, RemoteSender};
//! use storebridge_core::protocol::{Message, SubscribePayload};
//! use storebridge_core::store::{BuiltinReducer, Store};
//!
//! let (bridge, handle) = Bridge::new(Store::new(BuiltinReducer), 1024);
//! let task = tokio::spawn(bridge.run());
//!
//! let (sender, mut updates) = RemoteSender::channel();
//! handle.connect(sender.clone()).await?;
//! handle
//!     .deliver(sender, Message::SubscribeStore(SubscribePayload::default()))
//!     .await?;
//! ```

use std::collections::{HashMap, VecDeque};

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::protocol::{Message, SubscribePayload};
use crate::state::StateTree;
use crate::store::{Action, ListenerId, Store};

pub mod subscription;

pub use subscription::{RemoteSender, Subscription, WindowId};

/// Events accepted by the bridge run loop.
#[derive(Debug)]
pub enum BridgeEvent {
    /// A remote window connected; it is told the owner is ready
    Connected(RemoteSender),
    /// A message arrived from a remote window
    Remote {
        /// Handle back to the window that sent the message
        sender: RemoteSender,
        /// The message
        message: Message,
    },
    /// A remote window's connection ended
    Disconnected(WindowId),
    /// The owning process dispatches an action itself
    Dispatch(Action),
    /// Read the current state
    GetState(oneshot::Sender<StateTree>),
    /// Stop the run loop
    Shutdown,
}

/// Work deferred to the turn after the one that scheduled it.
#[derive(Debug)]
enum Task {
    Dispatch(Action),
}

/// The state sync bridge.
pub struct Bridge {
    store: Store,
    events: mpsc::Receiver<BridgeEvent>,
    deferred: VecDeque<Task>,
    registrations: HashMap<WindowId, ListenerId>,
    windows: HashMap<ListenerId, WindowId>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("store", &self.store)
            .field("deferred", &self.deferred.len())
            .field("registrations", &self.registrations.len())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Create a bridge around `store` with a run queue of `capacity` events.
    #[must_use]
    pub fn new(store: Store, capacity: usize) -> (Self, BridgeHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let bridge = Self {
            store,
            events: rx,
            deferred: VecDeque::new(),
            registrations: HashMap::new(),
            windows: HashMap::new(),
        };
        (bridge, BridgeHandle { tx })
    }

    /// The store owned by this bridge.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Number of live remote subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.registrations.len()
    }

    /// Run until shutdown or until every handle is dropped.
    ///
    /// Returns the store so the owner can inspect the final state.
    pub async fn run(mut self) -> Store {
        tracing::debug!("bridge run loop started");

        loop {
            // Tasks deferred by the previous turn go ahead of new events.
            if let Some(task) = self.deferred.pop_front() {
                self.run_task(task);
                continue;
            }

            let Some(event) = self.events.recv().await else {
                break;
            };
            if !self.handle_event(event) {
                break;
            }
        }

        // Deferred work was accepted before shutdown; finish it.
        while let Some(task) = self.deferred.pop_front() {
            self.run_task(task);
        }

        tracing::debug!(
            dispatches = self.store.dispatch_count(),
            "bridge run loop stopped"
        );
        self.store
    }

    /// Handle one event. Returns `false` when the loop should stop.
    fn handle_event(&mut self, event: BridgeEvent) -> bool {
        match event {
            BridgeEvent::Connected(sender) => {
                tracing::info!(window = %sender.window(), "remote window connected");
                if let Err(e) = sender.send(Message::RemoteStoreReady) {
                    tracing::debug!(window = %sender.window(), "ready signal not delivered: {e}");
                }
            }
            BridgeEvent::Remote { sender, message } => self.handle_remote(sender, message),
            BridgeEvent::Disconnected(window) => self.drop_window(window),
            BridgeEvent::Dispatch(action) => self.dispatch(action),
            BridgeEvent::GetState(reply) => {
                let _ = reply.send(self.store.get_state().clone());
            }
            BridgeEvent::Shutdown => return false,
        }
        true
    }

    fn handle_remote(&mut self, sender: RemoteSender, message: Message) {
        match message {
            Message::DispatchAction(action) => self.relay_action(action),
            Message::SubscribeStore(SubscribePayload { substore }) => {
                self.register_subscription(sender, substore);
            }
            Message::Error(message) => {
                tracing::warn!(window = %sender.window(), "remote reported error: {message}");
            }
            other => {
                tracing::warn!(
                    window = %sender.window(),
                    "ignoring {} message from remote window",
                    other.channel()
                );
            }
        }
    }

    /// Register `sender` for state updates.
    ///
    /// A window follows one subscription at a time: any earlier
    /// registration of the same window is replaced. An empty sub-tree key
    /// means the whole store. The first snapshot is pushed immediately,
    /// even when empty.
    pub fn register_subscription(&mut self, sender: RemoteSender, substore: Option<String>) {
        let window = sender.window();
        let substore = substore.filter(|key| !key.is_empty());

        if let Some(previous) = self.registrations.remove(&window) {
            self.windows.remove(&previous);
            self.store.unsubscribe(previous);
            tracing::debug!(%window, "replacing existing subscription");
        }

        let mut subscription = Subscription::new(sender, substore);
        if let Err(e) = subscription.send_initial(self.store.get_state()) {
            tracing::debug!(%window, "subscription not registered: {e}");
            return;
        }
        tracing::info!(
            %window,
            substore = subscription.substore().unwrap_or("*"),
            "remote store listener registered"
        );

        let id = self.store.subscribe(subscription);
        self.registrations.insert(window, id);
        self.windows.insert(id, window);
    }

    /// Defer an action received from a remote window to the next turn.
    pub fn relay_action(&mut self, action: Action) {
        tracing::debug!(action = %action.kind, "relaying remote action");
        self.deferred.push_back(Task::Dispatch(action));
    }

    /// Dispatch an action into the store and fan the change out.
    pub fn dispatch(&mut self, action: Action) {
        tracing::debug!(action = %action.kind, "dispatching");
        // Subscriptions whose window went away removed themselves.
        for id in self.store.dispatch(action) {
            if let Some(window) = self.windows.remove(&id) {
                self.registrations.remove(&window);
            }
        }
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::Dispatch(action) => self.dispatch(action),
        }
    }

    fn drop_window(&mut self, window: WindowId) {
        if let Some(id) = self.registrations.remove(&window) {
            self.windows.remove(&id);
            self.store.unsubscribe(id);
        }
        tracing::info!(%window, "remote window disconnected");
    }
}

/// Cloneable handle for posting events to a running [`Bridge`].
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<BridgeEvent>,
}

impl BridgeHandle {
    async fn post(&self, event: BridgeEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| Error::BridgeStopped)
    }

    /// Announce a newly connected remote window.
    pub async fn connect(&self, sender: RemoteSender) -> Result<()> {
        self.post(BridgeEvent::Connected(sender)).await
    }

    /// Deliver a message received from a remote window.
    pub async fn deliver(&self, sender: RemoteSender, message: Message) -> Result<()> {
        self.post(BridgeEvent::Remote { sender, message }).await
    }

    /// Report that a remote window's connection ended.
    pub async fn disconnect(&self, window: WindowId) -> Result<()> {
        self.post(BridgeEvent::Disconnected(window)).await
    }

    /// Dispatch an action from the owning process.
    pub async fn dispatch(&self, action: Action) -> Result<()> {
        self.post(BridgeEvent::Dispatch(action)).await
    }

    /// Read the current state.
    pub async fn state(&self) -> Result<StateTree> {
        let (reply, rx) = oneshot::channel();
        self.post(BridgeEvent::GetState(reply)).await?;
        rx.await.map_err(|_| Error::BridgeStopped)
    }

    /// Ask the run loop to stop.
    pub async fn shutdown(&self) -> Result<()> {
        self.post(BridgeEvent::Shutdown).await
    }

    /// Wait until the run loop has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// Whether the run loop has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

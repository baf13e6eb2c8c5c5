//! Common test utilities for `Storebridge` integration tests.
//!
//! This module provides shared functionality for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::Value;
use storebridge_core::bridge::{Bridge, BridgeHandle};
use storebridge_core::config::IpcConfig;
use storebridge_core::ipc::IpcServer;
use storebridge_core::protocol::Message;
use storebridge_core::state::{self, StateTree};
use storebridge_core::store::{BuiltinReducer, Reducer, Store};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How long a test waits for a message before failing.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Build a state tree from a JSON object literal.
pub fn tree(value: Value) -> StateTree {
    state::into_tree(value).expect("state must be a JSON object")
}

/// Start a bridge over `store` on the current runtime.
pub fn start_bridge(store: Store) -> (BridgeHandle, JoinHandle<Store>) {
    let (bridge, handle) = Bridge::new(store, 64);
    (handle, tokio::spawn(bridge.run()))
}

/// Start a bridge with the built-in reducer and an initial state.
pub fn start_builtin(state: Value) -> (BridgeHandle, JoinHandle<Store>) {
    start_bridge(Store::with_state(BuiltinReducer, tree(state)))
}

/// Start a bridge plus a loopback server bound to an ephemeral port.
///
/// Returns the address remote windows should connect to.
pub async fn start_owner(
    reducer: impl Reducer + 'static,
    state: Value,
) -> (String, BridgeHandle, JoinHandle<Store>) {
    let (handle, task) = start_bridge(Store::with_state(reducer, tree(state)));
    let config = IpcConfig {
        io_timeout: Duration::from_secs(2),
        ..IpcConfig::default()
    };
    let server = IpcServer::bind("127.0.0.1:0", handle.clone(), &config)
        .await
        .expect("bind loopback server");
    let addr = server.local_addr().expect("local addr").to_string();
    tokio::spawn(server.run());
    (addr, handle, task)
}

/// Receive the next message pushed to a remote window.
pub async fn recv(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("outbound queue closed")
}

/// Wait until the bridge has processed everything posted so far.
pub async fn settle(handle: &BridgeHandle) -> StateTree {
    handle.state().await.expect("bridge running")
}

/// Collect every message already queued for a remote window.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

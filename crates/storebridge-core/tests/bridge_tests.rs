//! Integration tests for the state sync bridge run loop.

mod common;

use serde_json::{json, Value};
use storebridge_core::bridge::RemoteSender;
use storebridge_core::protocol::{Message, SubscribePayload};
use storebridge_core::store::{Action, BuiltinReducer, Store};

use common::{drain, recv, settle, start_bridge, start_builtin, tree};

fn set(key: &str, value: Value) -> Action {
    Action::with_payload("state/set", json!({"key": key, "value": value}))
}

fn subscribe(substore: Option<&str>) -> Message {
    Message::SubscribeStore(SubscribePayload {
        substore: substore.map(str::to_string),
    })
}

#[tokio::test]
async fn test_connected_window_gets_ready_signal() {
    let (handle, _task) = start_builtin(json!({}));
    let (sender, mut rx) = RemoteSender::channel();

    handle.connect(sender).await.unwrap();

    assert_eq!(recv(&mut rx).await, Message::RemoteStoreReady);
}

#[tokio::test]
async fn test_whole_store_receives_diffs() {
    let (handle, _task) = start_builtin(json!({"a": 1, "b": 2}));
    let (sender, mut rx) = RemoteSender::channel();

    handle.deliver(sender, subscribe(None)).await.unwrap();
    assert_eq!(recv(&mut rx).await, Message::StateChange(json!({"a": 1, "b": 2})));

    handle.dispatch(set("b", json!(3))).await.unwrap();
    assert_eq!(recv(&mut rx).await, Message::StateChange(json!({"b": 3})));
}

#[tokio::test]
async fn test_unchanged_state_is_not_pushed() {
    let (handle, _task) = start_builtin(json!({"a": 1}));
    let (sender, mut rx) = RemoteSender::channel();

    handle.deliver(sender, subscribe(None)).await.unwrap();
    recv(&mut rx).await;

    handle.dispatch(set("a", json!(1))).await.unwrap();
    handle.dispatch(Action::new("unknown/action")).await.unwrap();
    settle(&handle).await;

    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_removed_keys_are_not_reported() {
    let (handle, _task) = start_builtin(json!({"a": 1, "b": 2}));
    let (sender, mut rx) = RemoteSender::channel();

    handle.deliver(sender, subscribe(None)).await.unwrap();
    recv(&mut rx).await;

    handle
        .dispatch(Action::with_payload("state/remove", json!({"key": "b"})))
        .await
        .unwrap();
    let state = settle(&handle).await;

    assert!(!state.contains_key("b"));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_substore_gets_full_slice_every_mutation() {
    let (handle, _task) = start_builtin(json!({"settings": {"theme": "dark"}}));
    let (sender, mut rx) = RemoteSender::channel();

    handle
        .deliver(sender, subscribe(Some("settings")))
        .await
        .unwrap();
    assert_eq!(recv(&mut rx).await, Message::StateChange(json!({"theme": "dark"})));

    handle.dispatch(set("unrelated", json!(1))).await.unwrap();
    handle.dispatch(set("unrelated", json!(2))).await.unwrap();

    for _ in 0..2 {
        assert_eq!(recv(&mut rx).await, Message::StateChange(json!({"theme": "dark"})));
    }
}

#[tokio::test]
async fn test_missing_substore_is_empty_object() {
    let (handle, _task) = start_builtin(json!({"a": 1}));
    let (sender, mut rx) = RemoteSender::channel();

    handle.deliver(sender, subscribe(Some("absent"))).await.unwrap();
    assert_eq!(recv(&mut rx).await, Message::StateChange(json!({})));

    handle.dispatch(set("a", json!(2))).await.unwrap();
    settle(&handle).await;
    assert!(drain(&mut rx).is_empty());

    handle
        .dispatch(set("absent", json!({"now": "here"})))
        .await
        .unwrap();
    assert_eq!(recv(&mut rx).await, Message::StateChange(json!({"now": "here"})));
}

#[tokio::test]
async fn test_repeated_registration_does_not_duplicate_pushes() {
    let (handle, _task) = start_builtin(json!({"a": 1}));
    let (sender, mut rx) = RemoteSender::channel();

    handle.deliver(sender.clone(), subscribe(None)).await.unwrap();
    handle.deliver(sender, subscribe(None)).await.unwrap();
    settle(&handle).await;
    assert_eq!(drain(&mut rx).len(), 2, "each registration sends a first snapshot");

    handle.dispatch(set("a", json!(2))).await.unwrap();
    settle(&handle).await;

    assert_eq!(drain(&mut rx), vec![Message::StateChange(json!({"a": 2}))]);
}

#[tokio::test]
async fn test_windows_keep_independent_subscriptions() {
    let (handle, _task) = start_builtin(json!({"a": 1}));
    let (first, mut first_rx) = RemoteSender::channel();
    let (second, mut second_rx) = RemoteSender::channel();

    handle.deliver(first, subscribe(None)).await.unwrap();
    handle.deliver(second, subscribe(None)).await.unwrap();
    recv(&mut first_rx).await;
    recv(&mut second_rx).await;

    handle.dispatch(set("a", json!(2))).await.unwrap();

    assert_eq!(recv(&mut first_rx).await, Message::StateChange(json!({"a": 2})));
    assert_eq!(recv(&mut second_rx).await, Message::StateChange(json!({"a": 2})));
}

#[tokio::test]
async fn test_remote_action_is_dispatched() {
    let (handle, _task) = start_builtin(json!({}));
    let (sender, mut rx) = RemoteSender::channel();

    handle.deliver(sender.clone(), subscribe(None)).await.unwrap();
    recv(&mut rx).await;

    handle
        .deliver(sender, Message::DispatchAction(set("unread", json!(4))))
        .await
        .unwrap();

    assert_eq!(recv(&mut rx).await, Message::StateChange(json!({"unread": 4})));
    assert_eq!(settle(&handle).await["unread"], json!(4));
}

#[tokio::test]
async fn test_empty_substore_key_follows_whole_store() {
    let (handle, _task) = start_builtin(json!({"a": 1, "b": 2}));
    let (sender, mut rx) = RemoteSender::channel();

    handle.deliver(sender, subscribe(Some(""))).await.unwrap();
    assert_eq!(recv(&mut rx).await, Message::StateChange(json!({"a": 1, "b": 2})));

    handle.dispatch(set("a", json!(5))).await.unwrap();
    assert_eq!(recv(&mut rx).await, Message::StateChange(json!({"a": 5})));
}

#[tokio::test]
async fn test_closed_window_does_not_affect_others() {
    let (handle, _task) = start_builtin(json!({}));
    let (gone, gone_rx) = RemoteSender::channel();
    let (alive, mut alive_rx) = RemoteSender::channel();

    handle.deliver(gone, subscribe(None)).await.unwrap();
    handle.deliver(alive, subscribe(None)).await.unwrap();
    recv(&mut alive_rx).await;
    drop(gone_rx);

    handle.dispatch(set("a", json!(1))).await.unwrap();
    handle.dispatch(set("a", json!(2))).await.unwrap();

    assert_eq!(recv(&mut alive_rx).await, Message::StateChange(json!({"a": 1})));
    assert_eq!(recv(&mut alive_rx).await, Message::StateChange(json!({"a": 2})));
}

#[tokio::test]
async fn test_disconnect_stops_pushes() {
    let (handle, _task) = start_builtin(json!({}));
    let (sender, mut rx) = RemoteSender::channel();
    let window = sender.window();

    handle.deliver(sender, subscribe(Some("x"))).await.unwrap();
    recv(&mut rx).await;

    handle.disconnect(window).await.unwrap();
    handle.dispatch(set("x", json!({"k": 1}))).await.unwrap();
    settle(&handle).await;

    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_shutdown_returns_final_store() {
    let (handle, task) = start_builtin(json!({"a": 1}));

    handle.dispatch(set("b", json!(2))).await.unwrap();
    handle.shutdown().await.unwrap();

    let store = task.await.unwrap();
    assert_eq!(*store.get_state(), tree(json!({"a": 1, "b": 2})));
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn test_empty_store_reports_empty_state() {
    let store = Store::new(BuiltinReducer);
    let (handle, _task) = start_bridge(store);
    assert!(settle(&handle).await.is_empty());
}

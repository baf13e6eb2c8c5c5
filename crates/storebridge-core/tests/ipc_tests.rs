//! End-to-end tests over the loopback transport.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use storebridge_core::ipc::RemoteStore;
use storebridge_core::protocol::{self, Channel, MAGIC};
use storebridge_core::state::StateTree;
use storebridge_core::store::{Action, BuiltinReducer};
use storebridge_core::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use common::{settle, start_owner, RECV_TIMEOUT};

async fn connect(addr: &str) -> RemoteStore {
    RemoteStore::connect(addr, Duration::from_secs(2))
        .await
        .expect("connect to owner")
}

async fn next(remote: &mut RemoteStore) -> serde_json::Value {
    tokio::time::timeout(RECV_TIMEOUT, remote.next_change())
        .await
        .expect("timed out waiting for stateChange")
        .expect("stateChange")
}

#[tokio::test]
async fn test_remote_mirror_follows_owner() {
    let (addr, handle, _task) = start_owner(BuiltinReducer, json!({"a": 1, "b": 2})).await;
    let mut remote = connect(&addr).await;

    remote.subscribe(None).await.unwrap();
    assert_eq!(next(&mut remote).await, json!({"a": 1, "b": 2}));

    handle
        .dispatch(Action::with_payload("state/set", json!({"key": "b", "value": 3})))
        .await
        .unwrap();

    assert_eq!(next(&mut remote).await, json!({"b": 3}));
    assert_eq!(remote.state(), &json!({"a": 1, "b": 3}));
}

#[tokio::test]
async fn test_remote_dispatch_reaches_other_windows() {
    let (addr, handle, _task) =
        start_owner(BuiltinReducer, json!({"settings": {"theme": "dark"}})).await;

    let mut viewer = connect(&addr).await;
    viewer.subscribe(Some("settings".into())).await.unwrap();
    assert_eq!(next(&mut viewer).await, json!({"theme": "dark"}));

    let mut editor = connect(&addr).await;
    editor
        .dispatch(&Action::with_payload(
            "state/merge",
            json!({"key": "settings", "value": {"theme": "light"}}),
        ))
        .await
        .unwrap();

    assert_eq!(next(&mut viewer).await, json!({"theme": "light"}));
    assert_eq!(viewer.state(), &json!({"theme": "light"}));
    assert_eq!(
        settle(&handle).await["settings"],
        json!({"theme": "light"})
    );
}

#[tokio::test]
async fn test_dispatch_then_disconnect_still_applies() {
    let (addr, handle, _task) = start_owner(BuiltinReducer, json!({})).await;

    let mut remote = connect(&addr).await;
    remote
        .dispatch(&Action::with_payload("state/set", json!({"key": "done", "value": true})))
        .await
        .unwrap();
    drop(remote);

    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        if settle(&handle).await.get("done") == Some(&json!(true)) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "action never applied");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_protocol_error_is_reported_to_window() {
    let (addr, _handle, _task) = start_owner(BuiltinReducer, json!({})).await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    let (_, ready) = protocol::read_frame(&mut stream).await.unwrap();
    assert!(ready.is_empty());

    let mut bogus = MAGIC.to_vec();
    bogus.extend_from_slice(&[1, 0, 0x42, 0, 0, 0, 0]);
    stream.write_all(&bogus).await.unwrap();

    let (header, payload) = tokio::time::timeout(RECV_TIMEOUT, protocol::read_frame(&mut stream))
        .await
        .expect("timed out")
        .expect("error frame");
    assert_eq!(header.channel, Channel::Error);
    let message: protocol::ErrorPayload = protocol::decode_payload(&payload).unwrap();
    assert!(message.message.contains("unknown channel"));
}

#[tokio::test]
async fn test_connect_to_missing_owner_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let err = RemoteStore::connect(&addr, Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(_) | Error::Timeout(_)));
}

#[tokio::test]
async fn test_server_stops_with_bridge() {
    let (addr, handle, task) = start_owner(BuiltinReducer, json!({"kept": 1})).await;
    let mut remote = connect(&addr).await;
    remote.subscribe(None).await.unwrap();
    next(&mut remote).await;

    handle.shutdown().await.unwrap();
    let store = task.await.unwrap();
    assert_eq!(store.get_state()["kept"], json!(1));

    let result = tokio::time::timeout(RECV_TIMEOUT, remote.next_change())
        .await
        .expect("window was never told the owner stopped");
    match result {
        Err(Error::Remote(message)) => assert_eq!(message, "owner stopped"),
        other => panic!("Expected Remote error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_resubscribing_switches_the_mirror() {
    let (addr, handle, _task) =
        start_owner(BuiltinReducer, json!({"n": 1, "settings": {"theme": "dark"}})).await;
    let mut remote = connect(&addr).await;

    remote.subscribe(None).await.unwrap();
    assert_eq!(
        next(&mut remote).await,
        json!({"n": 1, "settings": {"theme": "dark"}})
    );

    remote.subscribe(Some("settings".into())).await.unwrap();
    assert_eq!(next(&mut remote).await, json!({"theme": "dark"}));

    handle
        .dispatch(Action::with_payload("state/set", json!({"key": "n", "value": 2})))
        .await
        .unwrap();

    assert_eq!(next(&mut remote).await, json!({"theme": "dark"}));
    assert_eq!(remote.state(), &json!({"theme": "dark"}));
}

#[tokio::test]
async fn test_dispatched_action_is_isolated_from_sender() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let reducer = move |state: &StateTree, action: &Action| {
        recorder.lock().unwrap().push(action.clone());
        state.clone()
    };
    let (addr, handle, _task) = start_owner(reducer, json!({})).await;
    let mut remote = connect(&addr).await;

    let mut action = Action::with_payload("chat/send", json!({"text": "hello"}));
    remote.dispatch(&action).await.unwrap();
    action.payload["text"] = json!("edited");
    remote.dispatch(&action).await.unwrap();

    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        settle(&handle).await;
        if seen.lock().unwrap().len() == 2 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "actions never reached the reducer");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].payload, json!({"text": "hello"}));
    assert_eq!(seen[1].payload, json!({"text": "edited"}));
}

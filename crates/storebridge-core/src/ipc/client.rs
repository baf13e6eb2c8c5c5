//! Remote window side of the bridge.
//!
//! A [`RemoteStore`] connects to the owner, registers for updates and keeps
//! a local read-only mirror of the state. Whole-store mirrors are rebuilt
//! by merging each diff onto the previous mirror; sub-tree mirrors are
//! replaced by every slice received.

use std::time::Duration;

use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::{self, Message, SubscribePayload};
use crate::state;
use crate::store::Action;

/// Connection from a remote window to the owning process.
///
/// One `RemoteStore` follows at most one subscription: every `stateChange`
/// arriving on the connection is applied to the same mirror.
#[derive(Debug)]
pub struct RemoteStore<S = TcpStream> {
    stream: S,
    substore: Option<String>,
    mirror: Value,
}

impl RemoteStore<TcpStream> {
    /// Connect to the owner and wait until it signals readiness.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` if the owner does not answer within
    /// `io_timeout`, or an error if the handshake fails.
    pub async fn connect(addr: &str, io_timeout: Duration) -> Result<Self> {
        let stream = timeout(io_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout(io_timeout.as_secs()))??;
        stream.set_nodelay(true)?;
        tracing::debug!("Connected to owner at {}", addr);

        Self::handshake(stream, io_timeout).await
    }
}

impl<S> RemoteStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wait for `remoteStoreReady` on an already open stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner sends anything else first.
    pub async fn handshake(mut stream: S, io_timeout: Duration) -> Result<Self> {
        match protocol::read_message_with_timeout(&mut stream, io_timeout).await? {
            Message::RemoteStoreReady => {}
            Message::Error(message) => return Err(Error::Remote(message)),
            other => {
                return Err(Error::UnexpectedMessage {
                    expected: protocol::Channel::RemoteStoreReady.name().to_string(),
                    actual: other.channel().name().to_string(),
                })
            }
        }

        Ok(Self {
            stream,
            substore: None,
            mirror: Value::Object(Map::new()),
        })
    }

    /// Register for state updates, optionally scoped to one sub-tree.
    ///
    /// Resets the local mirror; the owner answers with a first snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be written.
    pub async fn subscribe(&mut self, substore: Option<String>) -> Result<()> {
        self.mirror = Value::Object(Map::new());
        self.substore.clone_from(&substore);

        let message = Message::SubscribeStore(SubscribePayload { substore });
        protocol::write_message(&mut self.stream, &message).await
    }

    /// Ask the owner to dispatch an action.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be written.
    pub async fn dispatch(&mut self, action: &Action) -> Result<()> {
        tracing::debug!(action = %action.kind, "dispatching to owner");
        let message = Message::DispatchAction(action.clone());
        protocol::write_message(&mut self.stream, &message).await
    }

    /// Wait for the next `stateChange` and fold it into the mirror.
    ///
    /// Returns the payload as received (a diff or a slice).
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` if the owner reports an error, or an error if
    /// the connection fails.
    pub async fn next_change(&mut self) -> Result<Value> {
        loop {
            match protocol::read_message(&mut self.stream).await? {
                Message::StateChange(change) => {
                    self.apply(&change);
                    return Ok(change);
                }
                Message::Error(message) => return Err(Error::Remote(message)),
                other => {
                    tracing::debug!("ignoring {} message from owner", other.channel());
                }
            }
        }
    }

    /// The local mirror.
    #[must_use]
    pub fn state(&self) -> &Value {
        &self.mirror
    }

    /// The sub-tree this connection follows, if any.
    #[must_use]
    pub fn substore(&self) -> Option<&str> {
        self.substore.as_deref()
    }

    fn apply(&mut self, change: &Value) {
        if self.substore.is_none() {
            if let (Value::Object(mirror), Value::Object(diff)) = (&mut self.mirror, change) {
                state::merge_diff(mirror, diff);
                return;
            }
        }
        self.mirror = change.clone();
    }
}

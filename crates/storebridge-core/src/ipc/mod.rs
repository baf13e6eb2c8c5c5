//! Loopback transport between the owning process and remote windows.
//!
//! The owner runs an [`IpcServer`]. Each accepted connection becomes one
//! remote window: a reader task turns incoming frames into bridge events and
//! a writer task drains the window's outbound queue onto the socket. Neither
//! task touches the store.
//!
//! An `error` frame is always the last frame of a connection. It is sent when
//! a frame cannot be decoded and when the owner stops.
//!
//! Remote windows connect with a [`RemoteStore`].

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;

use crate::bridge::{BridgeHandle, RemoteSender};
use crate::config::IpcConfig;
use crate::error::Result;
use crate::protocol::{self, Message};

pub mod client;

pub use client::RemoteStore;

/// Accepts remote window connections for a bridge.
#[derive(Debug)]
pub struct IpcServer {
    listener: TcpListener,
    bridge: BridgeHandle,
    io_timeout: Duration,
}

impl IpcServer {
    /// Bind the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        bridge: BridgeHandle,
        config: &IpcConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening for remote windows on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            bridge,
            io_timeout: config.io_timeout,
        })
    }

    /// The address the server is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the bridge stops.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting fails.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = self.listener.accept() => accepted?,
                () = self.bridge.closed() => {
                    tracing::debug!("bridge stopped, no longer accepting remote windows");
                    return Ok(());
                }
            };
            tracing::debug!("Connection from {}", peer_addr);

            let bridge = self.bridge.clone();
            let io_timeout = self.io_timeout;
            tokio::spawn(async move {
                serve_connection(stream, bridge, io_timeout).await;
            });
        }
    }
}

async fn serve_connection(stream: TcpStream, bridge: BridgeHandle, io_timeout: Duration) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Failed to set TCP_NODELAY: {e}");
    }
    let (mut reader, writer) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let sender = RemoteSender::new(crate::bridge::WindowId::new(), outbound_tx);
    let window = sender.window();

    let writer_handle = tokio::spawn(write_outbound(writer, outbound_rx, io_timeout));

    if bridge.connect(sender.clone()).await.is_err() {
        writer_handle.abort();
        return;
    }

    let owner_stopped = match read_inbound(&mut reader, &sender, &bridge).await {
        InboundEnd::WindowClosed => bridge.disconnect(window).await.is_err(),
        InboundEnd::OwnerStopped => true,
    };
    if owner_stopped {
        tracing::debug!(%window, "owner stopped, closing remote window");
        let _ = sender.send(Message::Error("owner stopped".to_string()));
    }
    drop(sender);
    // The writer ends after an error frame or once every sender is gone.
    if let Err(e) = writer_handle.await {
        tracing::debug!(%window, "writer task ended abnormally: {e}");
    }
}

/// Why a connection's reader stopped.
enum InboundEnd {
    WindowClosed,
    OwnerStopped,
}

async fn read_inbound(
    reader: &mut OwnedReadHalf,
    sender: &RemoteSender,
    bridge: &BridgeHandle,
) -> InboundEnd {
    let window = sender.window();
    loop {
        let read = tokio::select! {
            read = protocol::read_message(reader) => read,
            () = bridge.closed() => return InboundEnd::OwnerStopped,
        };
        let message = match read {
            Ok(message) => message,
            Err(e) if e.is_disconnect() => {
                tracing::debug!(%window, "remote window closed the connection");
                return InboundEnd::WindowClosed;
            }
            Err(e) => {
                tracing::warn!(%window, "Dropping remote window after protocol error: {e}");
                let _ = sender.send(Message::Error(e.to_string()));
                return InboundEnd::WindowClosed;
            }
        };

        if bridge.deliver(sender.clone(), message).await.is_err() {
            return InboundEnd::OwnerStopped;
        }
    }
}

async fn write_outbound(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    io_timeout: Duration,
) {
    while let Some(message) = outbound.recv().await {
        let last = matches!(message, Message::Error(_));
        let write = protocol::write_message(&mut writer, &message);
        match tokio::time::timeout(io_timeout, write).await {
            Ok(Ok(())) if last => return,
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!("Outbound write failed: {e}");
                return;
            }
            Err(_) => {
                tracing::warn!(
                    "Remote window stalled for {}s, closing connection",
                    io_timeout.as_secs()
                );
                return;
            }
        }
    }
}

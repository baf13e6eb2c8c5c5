//! Error types for Storebridge.
//!
//! The bridge itself never fails: it relays actions and pushes snapshots.
//! Errors come from the transport and configuration layers and are unified
//! here.

use std::io;

use thiserror::Error;

/// A specialized `Result` type for Storebridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Storebridge.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid protocol frame or payload
    #[error("invalid protocol message: {0}")]
    ProtocolError(String),

    /// Unsupported protocol version
    #[error("unsupported protocol version: {major}.{minor}")]
    UnsupportedVersion {
        /// Major version
        major: u8,
        /// Minor version
        minor: u8,
    },

    /// Unexpected channel received
    #[error("unexpected message: expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Expected channel name
        expected: String,
        /// Actual channel name received
        actual: String,
    },

    /// The peer reported an error
    #[error("remote error: {0}")]
    Remote(String),

    /// The other end of a channel has gone away
    #[error("channel closed")]
    ChannelClosed,

    /// The bridge run loop is no longer running
    #[error("bridge is not running")]
    BridgeStopped,

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Initial state file is not a JSON object
    #[error("invalid initial state: {0}")]
    InvalidState(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation timeout
    #[error("operation timed out after {0} seconds")]
    Timeout(u64),
}

impl Error {
    /// Returns whether this error means the peer is gone for good.
    ///
    /// A disconnected remote window only ends its own subscription.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::ChannelClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

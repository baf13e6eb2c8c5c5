//! Storebridge wire protocol.
//!
//! Remote windows talk to the owning process over a local stream. Every
//! message is a frame carrying one of the bridge channels.
//!
//! ## Frame Format
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      SBRG Frame                            │
//! ├────────────┬────────────┬────────────┬─────────────────────┤
//! │   Magic    │  Version   │  Channel   │      Length         │
//! │  4 bytes   │  2 bytes   │   1 byte   │      4 bytes        │
//! ├────────────┴────────────┴────────────┴─────────────────────┤
//! │                     JSON Payload                           │
//! │                    (variable length)                       │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! - Magic: `0x53 0x42 0x52 0x47` ("SBRG")
//! - Version: `0x01 0x00` (1.0)
//! - Channel: channel byte, see [`Channel`]
//! - Length: payload length in bytes (big-endian)
//!
//! ## Channels
//!
//! | Direction | Channel | Payload |
//! |-----------|---------|---------|
//! | remote → owner | `dispatchAction` | action object |
//! | remote → owner | `subscribeStore` | `{"substore"?: string}` |
//! | owner → remote | `stateChange` | state slice or diff |
//! | owner → remote | `remoteStoreReady` | none |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::store::Action;

/// Protocol magic bytes: "SBRG"
pub const MAGIC: [u8; 4] = [0x53, 0x42, 0x52, 0x47];

/// Frame header size in bytes
pub const HEADER_SIZE: usize = 11;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Named channels of the bridge protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    /// Remote asks the owner to dispatch an action
    DispatchAction = 0x01,
    /// Remote registers for state updates
    SubscribeStore = 0x02,
    /// Owner pushes a state slice or diff
    StateChange = 0x10,
    /// Owner is ready to accept registrations
    RemoteStoreReady = 0x11,
    /// Error report
    Error = 0xFF,
}

impl Channel {
    /// Parse a channel from its frame byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::DispatchAction),
            0x02 => Some(Self::SubscribeStore),
            0x10 => Some(Self::StateChange),
            0x11 => Some(Self::RemoteStoreReady),
            0xFF => Some(Self::Error),
            _ => None,
        }
    }

    /// The channel name used by remote windows.
    pub const fn name(self) -> &'static str {
        match self {
            Self::DispatchAction => "dispatchAction",
            Self::SubscribeStore => "subscribeStore",
            Self::StateChange => "stateChange",
            Self::RemoteStoreReady => "remoteStoreReady",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A protocol frame header.
#[derive(Debug, Clone)]
pub struct FrameHeader {
    /// Protocol version (major, minor)
    pub version: (u8, u8),
    /// Channel
    pub channel: Channel,
    /// Payload length
    pub payload_length: u32,
}

impl FrameHeader {
    /// Encode the header to bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4] = self.version.0;
        buf[5] = self.version.1;
        buf[6] = self.channel as u8;
        buf[7..11].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode a header from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        if buf[0..4] != MAGIC {
            return Err(Error::ProtocolError("invalid magic bytes".to_string()));
        }

        let version = (buf[4], buf[5]);
        if version.0 != crate::PROTOCOL_VERSION.0 {
            return Err(Error::UnsupportedVersion {
                major: version.0,
                minor: version.1,
            });
        }

        let channel = Channel::from_byte(buf[6])
            .ok_or_else(|| Error::ProtocolError(format!("unknown channel: 0x{:02X}", buf[6])))?;

        let payload_length = u32::from_be_bytes([buf[7], buf[8], buf[9], buf[10]]);
        if payload_length as usize > MAX_PAYLOAD_SIZE {
            return Err(Error::ProtocolError(format!(
                "payload too large: {payload_length} bytes"
            )));
        }

        Ok(Self {
            version,
            channel,
            payload_length,
        })
    }
}

/// `subscribeStore` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribePayload {
    /// Name of the sub-tree to follow, or `None` for the whole state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substore: Option<String>,
}

/// `error` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human readable message
    pub message: String,
}

/// A decoded bridge message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `dispatchAction`
    DispatchAction(Action),
    /// `subscribeStore`
    SubscribeStore(SubscribePayload),
    /// `stateChange`
    StateChange(Value),
    /// `remoteStoreReady`
    RemoteStoreReady,
    /// `error`
    Error(String),
}

impl Message {
    /// The channel this message travels on.
    #[must_use]
    pub fn channel(&self) -> Channel {
        match self {
            Self::DispatchAction(_) => Channel::DispatchAction,
            Self::SubscribeStore(_) => Channel::SubscribeStore,
            Self::StateChange(_) => Channel::StateChange,
            Self::RemoteStoreReady => Channel::RemoteStoreReady,
            Self::Error(_) => Channel::Error,
        }
    }

    /// Encode the payload of this message.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        match self {
            Self::DispatchAction(action) => encode_payload(action),
            Self::SubscribeStore(payload) => encode_payload(payload),
            Self::StateChange(state) => encode_payload(state),
            Self::RemoteStoreReady => Ok(Vec::new()),
            Self::Error(message) => encode_payload(&ErrorPayload {
                message: message.clone(),
            }),
        }
    }

    /// Decode a message from its channel and payload bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match the channel.
    pub fn decode(channel: Channel, payload: &[u8]) -> Result<Self> {
        Ok(match channel {
            Channel::DispatchAction => Self::DispatchAction(decode_payload(payload)?),
            Channel::SubscribeStore if payload.is_empty() => {
                Self::SubscribeStore(SubscribePayload::default())
            }
            Channel::SubscribeStore => Self::SubscribeStore(decode_payload(payload)?),
            Channel::StateChange => Self::StateChange(decode_payload(payload)?),
            Channel::RemoteStoreReady => Self::RemoteStoreReady,
            Channel::Error => Self::Error(decode_payload::<ErrorPayload>(payload)?.message),
        })
    }
}

/// Encode a message payload to JSON bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(payload).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a message payload from JSON bytes.
///
/// # Errors
///
/// Returns an error if deserialization fails.
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| Error::Serialization(e.to_string()))
}

/// Read a complete frame from a stream.
///
/// # Errors
///
/// Returns an error if reading fails or the frame is invalid.
pub async fn read_frame<R>(reader: &mut R) -> Result<(FrameHeader, Vec<u8>)>
where
    R: AsyncReadExt + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf).await?;

    let header = FrameHeader::decode(&header_buf)?;

    let mut payload = vec![0u8; header.payload_length as usize];
    if header.payload_length > 0 {
        reader.read_exact(&mut payload).await?;
    }

    Ok((header, payload))
}

/// Write a complete frame to a stream.
///
/// # Errors
///
/// Returns an error if the payload is too large or writing fails.
pub async fn write_frame<W>(writer: &mut W, channel: Channel, payload: &[u8]) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(Error::ProtocolError(format!(
            "payload too large: {} bytes",
            payload.len()
        )));
    }

    #[allow(clippy::cast_possible_truncation)]
    let header = FrameHeader {
        version: crate::PROTOCOL_VERSION,
        channel,
        payload_length: payload.len() as u32,
    };

    writer.write_all(&header.encode()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;

    Ok(())
}

/// Read and decode one message.
///
/// # Errors
///
/// Returns an error if reading or decoding fails.
pub async fn read_message<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncReadExt + Unpin,
{
    let (header, payload) = read_frame(reader).await?;
    Message::decode(header.channel, &payload)
}

/// Encode and write one message.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let payload = message.encode_payload()?;
    write_frame(writer, message.channel(), &payload).await
}

/// Read one message with a timeout.
///
/// # Errors
///
/// Returns `Error::Timeout` if the operation exceeds the specified duration.
/// Returns an error if reading fails or the message is invalid.
pub async fn read_message_with_timeout<R>(reader: &mut R, duration: Duration) -> Result<Message>
where
    R: AsyncReadExt + Unpin,
{
    timeout(duration, read_message(reader))
        .await
        .map_err(|_| Error::Timeout(duration.as_secs()))?
}

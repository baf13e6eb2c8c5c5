//! # Storebridge Core Library
//!
//! `storebridge-core` keeps one canonical application state in an owning
//! process and mirrors it into any number of remote windows over a local
//! inter-process channel.
//!
//! ## Features
//!
//! - **Single owner**: the [`store::Store`] is mutated only through dispatched actions
//! - **Incremental mirrors**: whole-store subscribers receive shallow diffs
//! - **Sub-tree mirrors**: subscribers can follow a single named slice of the state
//! - **Action relay**: remote windows dispatch actions back into the owner
//!
//! ## Modules
//!
//! - [`bridge`] - State sync bridge (subscriptions, run queue, change fan-out)
//! - [`config`] - Configuration management
//! - [`ipc`] - Loopback transport (owner server, remote client)
//! - [`protocol`] - Wire frames and channel names
//! - [`state`] - State tree, shallow diff, sub-tree selection
//! - [`store`] - Store, actions and reducers
//!
//! ## Example
//!
//! ```rust,ignore
//! use storebridge_core::bridge::Bridge;
//! use storebridge_core::ipc::IpcServer;
//! use storebridge_core::store::{BuiltinReducer, Store};
//!
//! let store = Store::new(BuiltinReducer);
//! let (bridge, handle) = Bridge::new(store, 1024);
//! let server = IpcServer::bind("127.0.0.1:52700", handle.clone(), &config.ipc).await?;
//! tokio::spawn(server.run());
//! let store = bridge.run().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]

pub mod bridge;
pub mod config;
pub mod error;
pub mod ipc;
pub mod protocol;
pub mod state;
pub mod store;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wire protocol version
pub const PROTOCOL_VERSION: (u8, u8) = (1, 0);

/// Default loopback port the owner listens on
pub const DEFAULT_IPC_PORT: u16 = 52700;

/// Default timeout for connect and handshake I/O in seconds
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 10;

/// Default capacity of the bridge run queue
pub const DEFAULT_RUN_QUEUE_CAPACITY: usize = 1024;

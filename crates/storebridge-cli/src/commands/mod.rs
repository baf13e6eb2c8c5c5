//! CLI command definitions and handlers.

use clap::{Parser, Subcommand};

use storebridge_core::config::Config;

pub mod config;
pub mod dispatch;
pub mod serve;
pub mod watch;

/// Load configuration with graceful fallback to defaults.
///
/// A broken config file is reported and then ignored so the commands keep
/// working.
pub fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring configuration: {e}");
        Config::default()
    })
}

/// Pick the owner address: command line first, then configuration.
pub fn resolve_address(arg: Option<String>, config: &Config) -> String {
    arg.unwrap_or_else(|| config.ipc.address.clone())
}

/// Storebridge - state sync between an owning process and remote windows
#[derive(Parser)]
#[command(name = "storebridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Run the owning process: store, bridge and loopback server
    Serve(serve::ServeArgs),

    /// Mirror the owner's state as a remote window
    Watch(watch::WatchArgs),

    /// Send one action to the owner
    Dispatch(dispatch::DispatchArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

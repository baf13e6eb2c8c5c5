//! Storebridge CLI - state sync between an owning process and remote windows
//!
//! The owner keeps the canonical state and serves it to remote windows over
//! a loopback connection. Remote windows mirror the state and dispatch
//! actions back.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run the owner
//! storebridge serve --initial-state ./state.json
//!
//! # Mirror the whole state (in another terminal)
//! storebridge watch
//!
//! # Change it
//! storebridge dispatch state/set --payload '{"key": "theme", "value": "dark"}'
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::Parser;

mod commands;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => commands::serve::run(args).await,
        Command::Watch(args) => commands::watch::run(args).await,
        Command::Dispatch(args) => commands::dispatch::run(args).await,
        Command::Config(args) => commands::config::run(&args),
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,storebridge=info,storebridge_core=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

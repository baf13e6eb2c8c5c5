//! Serve command: run the owning process.

use std::path::PathBuf;

use anyhow::Context;
use storebridge_core::bridge::Bridge;
use storebridge_core::ipc::IpcServer;
use storebridge_core::store::{BuiltinReducer, Store};

use super::{load_config, resolve_address};

/// Arguments for the serve command
#[derive(clap::Parser)]
pub struct ServeArgs {
    /// Address to listen on (defaults to the configured ipc.address)
    #[arg(short, long)]
    pub address: Option<String>,

    /// JSON file holding the initial state object
    #[arg(long)]
    pub initial_state: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config();
    if let Some(path) = args.initial_state {
        config.store.initial_state = Some(path);
    }
    let address = resolve_address(args.address, &config);

    let state = config
        .store
        .load_initial_state()
        .context("Failed to load initial state")?;
    let store = Store::with_state(BuiltinReducer, state);

    let (bridge, handle) = Bridge::new(store, config.bridge.run_queue_capacity);
    let bridge_task = tokio::spawn(bridge.run());

    let server = IpcServer::bind(address.as_str(), handle.clone(), &config.ipc)
        .await
        .with_context(|| format!("Cannot listen on {address}"))?;
    let local_addr = server.local_addr()?;

    if !args.quiet {
        println!("\nStorebridge v{}", env!("CARGO_PKG_VERSION"));
        println!("─────────────────────────────────────");
        println!();
        println!("  Owner listening on {}", local_addr);
        println!("  Press Ctrl+C to stop");
        println!();
    }

    let server_task = tokio::spawn(server.run());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Shutting down");

    handle.shutdown().await?;
    let store = bridge_task.await.context("Bridge task failed")?;
    server_task.abort();

    if !args.quiet {
        println!();
        println!("  Dispatched actions: {}", store.dispatch_count());
        println!(
            "  Final state: {}",
            serde_json::to_string_pretty(store.get_state())?
        );
    }

    Ok(())
}

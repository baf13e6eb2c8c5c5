//! Watch command: mirror the owner's state as a remote window.

use anyhow::Context;
use storebridge_core::ipc::RemoteStore;

use super::{load_config, resolve_address};

/// Arguments for the watch command
#[derive(clap::Parser)]
pub struct WatchArgs {
    /// Owner address (defaults to the configured ipc.address)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Follow one named sub-tree instead of the whole state
    #[arg(short, long)]
    pub substore: Option<String>,

    /// Exit after this many updates
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run the watch command
pub async fn run(args: WatchArgs) -> anyhow::Result<()> {
    let config = load_config();
    let address = resolve_address(args.address.clone(), &config);

    let mut remote = RemoteStore::connect(&address, config.ipc.io_timeout)
        .await
        .with_context(|| format!("Cannot reach owner at {address}"))?;
    remote.subscribe(args.substore.clone()).await?;

    if !args.json {
        match &args.substore {
            Some(key) => println!("Watching '{}' on {}", key, address),
            None => println!("Watching state on {}", address),
        }
    }

    let mut received = 0usize;
    loop {
        if args.count.is_some_and(|limit| received >= limit) {
            return Ok(());
        }

        let change = tokio::select! {
            change = remote.next_change() => change.context("Lost connection to owner")?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };
        received += 1;

        if args.json {
            let output = serde_json::json!({
                "change": change,
                "state": remote.state(),
            });
            println!("{}", serde_json::to_string(&output)?);
        } else {
            println!();
            println!("  stateChange: {}", change);
            println!("  mirror:      {}", serde_json::to_string_pretty(remote.state())?);
        }
    }
}

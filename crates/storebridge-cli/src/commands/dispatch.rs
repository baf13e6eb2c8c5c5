//! Dispatch command: send one action to the owner.

use anyhow::Context;
use serde_json::Value;
use storebridge_core::ipc::RemoteStore;
use storebridge_core::store::Action;

use super::{load_config, resolve_address};

/// Arguments for the dispatch command
#[derive(clap::Parser)]
pub struct DispatchArgs {
    /// Action type, e.g. state/set
    pub action_type: String,

    /// Action payload as JSON
    #[arg(short, long)]
    pub payload: Option<String>,

    /// Owner address (defaults to the configured ipc.address)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Run the dispatch command
pub async fn run(args: DispatchArgs) -> anyhow::Result<()> {
    let action = build_action(&args.action_type, args.payload.as_deref())?;

    let config = load_config();
    let address = resolve_address(args.address, &config);

    let mut remote = RemoteStore::connect(&address, config.ipc.io_timeout)
        .await
        .with_context(|| format!("Cannot reach owner at {address}"))?;
    remote.dispatch(&action).await?;

    if !args.quiet {
        println!("Dispatched {} to {}", action.kind, address);
    }
    Ok(())
}

fn build_action(action_type: &str, payload: Option<&str>) -> anyhow::Result<Action> {
    let payload = match payload {
        Some(raw) => serde_json::from_str(raw).context("Payload is not valid JSON")?,
        None => Value::Null,
    };
    Ok(Action::with_payload(action_type, payload))
}

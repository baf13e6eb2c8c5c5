//! Config command: inspect and create the configuration file.

use anyhow::Context;
use clap::Subcommand;
use storebridge_core::config::Config;

/// Arguments for the config command
#[derive(clap::Parser)]
pub struct ConfigArgs {
    /// Config action
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config actions
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Print the configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command
pub fn run(args: &ConfigArgs) -> anyhow::Result<()> {
    match args.action {
        ConfigAction::Show => {
            let config = Config::load().context("Failed to load configuration")?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }
        ConfigAction::Init { force } => {
            let path = Config::config_path();
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save()?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

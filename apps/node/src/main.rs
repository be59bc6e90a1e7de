//! Hyperion node entry point.

mod cli;
mod commands;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hyperion_node_config::{CredentialStore, default_store_path};

use crate::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging before anything touches the store, so
    // load errors are reported. `RUST_LOG` wins over the level picked here.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let level_from_env = env_filter.is_some();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter.unwrap_or_else(|| EnvFilter::new(log_level(cli.verbose, false))))
        .with_filter_reloading();
    let filter_handle = builder.reload_handle();
    builder.init();

    let path = match cli.store.clone() {
        Some(path) => path,
        None => default_store_path().context("cannot determine home directory for the store")?,
    };
    let store = open_store(&path)?;

    if !level_from_env {
        let level = log_level(cli.verbose, store.get_setting("debug", false));
        if let Err(e) = filter_handle.reload(EnvFilter::new(level)) {
            tracing::warn!(error = %e, "failed to apply log level from store");
        }
    }

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        store = %path.display(),
        "starting Hyperion node"
    );

    match cli.command {
        Commands::Info => commands::info(&store),
        Commands::Hubs => commands::hubs(&store),
        Commands::Remove { name } => commands::remove(&store, &name)?,
        Commands::Use { name } => commands::use_hub(&store, &name)?,
        Commands::Enroll {
            name,
            address,
            otp,
            host,
            port,
            tls,
        } => {
            let url = commands::hub_url(&address, host.as_deref(), port, tls)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::enroll(store, &name, &url, &otp))?;
        }
        Commands::Worker { hub } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::worker(store, hub))?;
            tracing::info!("worker shut down cleanly");
        }
    }

    Ok(())
}

fn log_level(verbose: bool, debug_setting: bool) -> &'static str {
    if verbose || debug_setting { "debug" } else { "info" }
}

fn open_store(path: &Path) -> anyhow::Result<Arc<CredentialStore>> {
    let store = CredentialStore::open(path)
        .with_context(|| format!("failed to open store at {}", path.display()))?;
    Ok(Arc::new(store))
}

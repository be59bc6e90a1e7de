//! Command-line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "hyperion-node")]
#[command(about = "Enroll this node with Hyperion hubs and stream hub events", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Store file (defaults to ~/.hyperion_node/config.toml)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Log at debug level regardless of the node setting
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show node identity and store location
    Info,

    /// Enroll with a hub using a one-time password
    Enroll {
        /// Local name for the hub
        name: String,

        /// Hub url (`https://hub:8443`) or address (`hub`, `hub:9000`)
        address: String,

        /// One-time password issued by the hub
        #[arg(long)]
        otp: String,

        /// Host override for a bare address
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port override for a bare address
        #[arg(short, long)]
        port: Option<u32>,

        /// Use https when composing the url from an address
        #[arg(long)]
        tls: bool,
    },

    /// List enrolled hubs
    Hubs,

    /// Remove an enrolled hub
    Remove {
        name: String,
    },

    /// Make a hub the default for the worker
    Use {
        name: String,
    },

    /// Keep a connection to a hub open until interrupted
    #[command(hide = true)]
    Worker {
        /// Hub to connect to instead of the default
        #[arg(long)]
        hub: Option<String>,
    },
}

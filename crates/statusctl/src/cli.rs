//! CLI - Command-line argument parsing

use clap::{Parser, Subcommand};

/// Default daemon address
pub const DEFAULT_URL: &str = "http://127.0.0.1:7870";

/// Query a running statusd
#[derive(Parser, Debug)]
#[command(name = "statusctl")]
#[command(about = "Query the statusd service-health aggregator", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Base URL of the daemon
    #[arg(long, global = true, env = "STATUSCTL_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// Print raw JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Status of every tracked service
    Status,

    /// Status and detail of one service
    Service {
        /// Service id, e.g. `github`
        id: String,
    },

    /// Most critical problems right now
    Top {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Clear the daemon's status caches
    Flush,

    /// Daemon health
    Health,
}

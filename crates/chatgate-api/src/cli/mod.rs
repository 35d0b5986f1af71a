//! CLI command definitions for the `chatgate` binary.

pub mod message;
pub mod session;

use clap::{Parser, Subcommand};

/// Multi-session chat gateway.
#[derive(Parser)]
#[command(name = "chatgate", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "CHATGATE_LOG_JSON")]
    pub log_json: bool,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true, env = "CHATGATE_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Restore stored sessions and start the REST API server.
    Serve {
        /// Port to listen on (defaults to `server.port` in config.toml).
        #[arg(short, long, env = "CHATGATE_PORT")]
        port: Option<u16>,

        /// Host to bind to (defaults to `server.host` in config.toml).
        #[arg(long, env = "CHATGATE_HOST")]
        host: Option<String>,
    },

    /// Show the sent-message log.
    Messages {
        /// Only show the most recent N messages.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// List sessions with stored credentials.
    Sessions,
}

//! Chatgate CLI and REST API entry point.
//!
//! Binary name: `chatgate`
//!
//! Parses CLI arguments, initializes storage and services, then dispatches to
//! the requested command or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use tracing::{error, info};

use chatgate_observe::{TracingOptions, init_tracing, shutdown_tracing};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let tracing_options = TracingOptions {
        default_filter: TracingOptions::filter_for_verbosity(cli.verbose, cli.quiet).to_string(),
        json: cli.log_json,
        otel: cli.otel,
    };
    if let Err(e) = init_tracing(&tracing_options) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Serve { port, host } => serve(state, host, port, cli.quiet).await,
        Commands::Messages { limit } => cli::message::list_messages(&state, limit, cli.json).await,
        Commands::Sessions => cli::session::list_stored_sessions(&state, cli.json).await,
    };

    shutdown_tracing();
    result
}

async fn serve(
    state: AppState,
    host: Option<String>,
    port: Option<u16>,
    quiet: bool,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(data_dir = %state.data_dir.display(), %addr, "Starting gateway");
    let report = state.sessions.restore_sessions().await?;
    info!(
        restored = report.restored.len(),
        failed = report.failed.len(),
        "Stored sessions restored"
    );

    if !quiet {
        println!(
            "  {} Chatgate listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }

    let router = http::router::build_router(state.clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.sessions.shutdown().await;
    if !quiet {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

//! Application state wiring all services together.
//!
//! `AppState` holds the concrete service instances used by both CLI and REST
//! API. Services are generic over the core ports; `AppState` pins them to the
//! concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use chatgate_core::dispatch::MessageDispatcher;
use chatgate_core::session::{SessionManager, SessionOptions};
use chatgate_infra::config::load_gateway_config;
use chatgate_infra::filesystem::{FileCredentialStore, resolve_data_dir, sessions_dir};
use chatgate_infra::media::HttpMediaFetcher;
use chatgate_infra::pairing::QrPairingRenderer;
use chatgate_infra::sqlite::message::SqliteMessageLog;
use chatgate_infra::sqlite::pool::{DatabasePool, database_url};
use chatgate_infra::transport::BridgeConnector;
use chatgate_types::config::GatewayConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteSessionManager =
    SessionManager<BridgeConnector, FileCredentialStore, QrPairingRenderer>;

pub type ConcreteDispatcher = MessageDispatcher<SqliteMessageLog, HttpMediaFetcher>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<ConcreteSessionManager>,
    pub dispatcher: Arc<ConcreteDispatcher>,
    pub config: Arc<GatewayConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize from the resolved data directory and its `config.toml`.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;
        let config = load_gateway_config(&data_dir).await;
        Self::build(data_dir, config).await
    }

    /// Wire services for `data_dir` with an explicit config.
    pub async fn build(data_dir: PathBuf, config: GatewayConfig) -> anyhow::Result<Self> {
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let sessions = SessionManager::new(
            BridgeConnector::from_config(&config.transport)?,
            FileCredentialStore::new(sessions_dir(&data_dir)),
            QrPairingRenderer::new(config.pairing.print_to_console),
            SessionOptions::from_config(&config),
        );

        let dispatcher = MessageDispatcher::with_offset_minutes(
            SqliteMessageLog::new(db_pool),
            HttpMediaFetcher::from_config(&config.dispatch)?,
            config.timezone_offset_minutes,
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            dispatcher: Arc::new(dispatcher),
            config: Arc::new(config),
            data_dir,
        })
    }
}

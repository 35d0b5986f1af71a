//! Gateway configuration types.
//!
//! `GatewayConfig` represents the top-level `config.toml`. Every section and
//! field has a default, so an empty file (or no file) is a valid config.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the gateway.
///
/// Loaded from `~/.chatgate/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub pairing: PairingConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Offset from UTC, in minutes, used to stamp message log entries.
    #[serde(default = "default_timezone_offset_minutes")]
    pub timezone_offset_minutes: i32,
}

fn default_timezone_offset_minutes() -> i32 {
    // America/Sao_Paulo, which has not observed DST since 2019.
    -180
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            transport: TransportConfig::default(),
            pairing: PairingConfig::default(),
            reconnect: ReconnectConfig::default(),
            dispatch: DispatchConfig::default(),
            timezone_offset_minutes: default_timezone_offset_minutes(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Where the transport bridge lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    /// Name of the environment variable holding the bridge bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3100".to_string()
}

fn default_token_env() -> String {
    "CHATGATE_BRIDGE_TOKEN".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            token_env: default_token_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Pairing flow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingConfig {
    /// How long a session-creation caller waits for its pairing result.
    #[serde(default = "default_pairing_timeout_secs")]
    pub timeout_secs: u64,
    /// Render pairing codes on the operator console.
    #[serde(default = "default_true")]
    pub print_to_console: bool,
}

fn default_pairing_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_pairing_timeout_secs(),
            print_to_console: true,
        }
    }
}

/// Backoff applied between automatic reconnection attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Consecutive failed attempts before giving up; 0 retries forever.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Outbound message dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Delay applied before a send when the caller does not give one.
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,
    #[serde(default = "default_media_timeout_secs")]
    pub media_timeout_secs: u64,
    #[serde(default = "default_media_max_bytes")]
    pub media_max_bytes: u64,
}

fn default_delay_ms() -> u64 {
    500
}

fn default_media_timeout_secs() -> u64 {
    60
}

fn default_media_max_bytes() -> u64 {
    64 * 1024 * 1024
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: default_delay_ms(),
            media_timeout_secs: default_media_timeout_secs(),
            media_max_bytes: default_media_max_bytes(),
        }
    }
}

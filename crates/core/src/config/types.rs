use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;
use crate::processor::ToolsConfig;
use crate::shortener::ShortenerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub shortener: ShortenerConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted upload body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

/// Artifact storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per container.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_input_container")]
    pub input_container: String,
    #[serde(default = "default_output_container")]
    pub output_container: String,
    /// Base URL under which containers are publicly reachable.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            input_container: default_input_container(),
            output_container: default_output_container(),
            public_base_url: default_public_base_url(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/artifacts")
}

fn default_input_container() -> String {
    "input-files".to_string()
}

fn default_output_container() -> String {
    "output-files".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080/files".to_string()
}

/// Job ledger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Partition every job row is written under.
    #[serde(default = "default_partition")]
    pub partition: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            partition: default_partition(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("transmute.db")
}

fn default_partition() -> String {
    "jobs".to_string()
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
    pub orchestrator: OrchestratorConfig,
    pub shortener: SanitizedShortenerConfig,
}

/// Shortener config without the endpoint query details.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedShortenerConfig {
    pub enabled: bool,
    pub host: Option<String>,
    pub timeout_ms: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: config.storage.clone(),
            ledger: config.ledger.clone(),
            orchestrator: config.orchestrator.clone(),
            shortener: SanitizedShortenerConfig {
                enabled: config.shortener.enabled,
                host: reqwest::Url::parse(&config.shortener.endpoint)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string)),
                timeout_ms: config.shortener.timeout_ms,
            },
        }
    }
}

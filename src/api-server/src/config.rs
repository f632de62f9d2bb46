//! Server configuration loading and validation
//!
//! Every section is optional; command-line flags and environment variables
//! override what the file sets.

use crate::server::ServerConfig;
use anyhow::{Context, Result};
use hrms_authz::{AccessControlConfig, Role};
use hrms_org::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Complete server configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HrmsConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub access_control: AccessControlSection,

    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSection {
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessControlSection {
    /// Grants and hierarchy file; the standard chain is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSection {
    /// `memory` or `postgres`
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub database_url: Option<String>,
    /// People loaded into the in-memory backend at startup
    #[serde(default)]
    pub seed: Vec<SeedPerson>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedPerson {
    pub employee_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> usize {
    10000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_transaction_timeout() -> u64 {
    5000
}

fn default_backend() -> String {
    "memory".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            transaction_timeout_ms: default_transaction_timeout(),
            enable_metrics: true,
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: None,
            seed: Vec::new(),
        }
    }
}

impl HrmsConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: HrmsConfig =
            toml::from_str(source).context("Failed to parse configuration file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.transaction_timeout_ms == 0 {
            anyhow::bail!("Transaction timeout must be greater than zero");
        }

        if self.server.max_connections == 0 {
            anyhow::bail!("max_connections must be greater than zero");
        }

        match self.storage.backend.as_str() {
            "memory" => {}
            "postgres" => {
                if self.storage.database_url.is_none() {
                    anyhow::bail!("The postgres backend requires storage.database_url");
                }
            }
            other => {
                anyhow::bail!("Storage backend must be 'memory' or 'postgres', got '{}'", other)
            }
        }

        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            max_connections: self.server.max_connections,
            request_timeout: self.server.request_timeout_secs,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            transaction_timeout: Duration::from_millis(self.engine.transaction_timeout_ms),
            enable_metrics: self.engine.enable_metrics,
        }
    }

    /// Access-control rules from the configured file, or the standard set
    pub fn access_control(&self) -> Result<AccessControlConfig> {
        match &self.access_control.path {
            Some(path) => AccessControlConfig::load(path)
                .with_context(|| format!("Failed to load access control from {}", path.display())),
            None => Ok(AccessControlConfig::standard()),
        }
    }
}

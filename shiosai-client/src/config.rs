use serde::{Deserialize, Serialize};
use thiserror::Error;

use shiosai_store::CacheTtls;

/// Client configuration loaded from YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiSettings,
    pub log: LogSettings,
    pub metrics: MetricsSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the portal backend.
    pub base_url: String,
    /// Transport timeout per request, in seconds.
    pub timeout_secs: u64,
    /// Origin reported to the background data worker.
    pub origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub user_ttl_secs: i64,
    pub data_ttl_secs: i64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8009".to_string(),
            timeout_secs: 30,
            origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            user_ttl_secs: 3600,
            data_ttl_secs: 3600,
        }
    }
}

impl CacheSettings {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            user: chrono::Duration::seconds(self.user_ttl_secs),
            data: chrono::Duration::seconds(self.data_ttl_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl ClientConfig {
    /// Load from a YAML file; `None` yields the defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&raw)?)
            }
            None => Ok(Self::default()),
        }
    }
}

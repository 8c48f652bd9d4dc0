use config::{Config, File};
pub use config::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that selects the API base URL.
pub const BASE_URL_ENV: &str = "KASANEHA_API_BASE_URL";

/// Local development API address used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KasanehaConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl ApiConfig {
    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding the durable token file. `~` and `$VARS` are expanded.
    #[serde(default = "default_token_dir")]
    pub token_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_dir: default_token_dir(),
        }
    }
}

impl StorageConfig {
    pub fn token_dir(&self) -> PathBuf {
        match shellexpand::full(&self.token_dir) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                tracing::warn!(error = %e, dir = %self.token_dir, "Could not expand token_dir, using it verbatim");
                PathBuf::from(&self.token_dir)
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    #[serde(default = "default_duration_ms")]
    pub default_duration_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: default_duration_ms(),
        }
    }
}

impl NotificationConfig {
    pub fn default_duration(&self) -> Duration {
        Duration::from_millis(self.default_duration_ms)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_token_dir() -> String {
    "~/.local/share/kasaneha".to_string()
}

fn default_duration_ms() -> u64 {
    5000
}

impl KasanehaConfig {
    /// Load from an optional TOML file, then apply `KASANEHA_API_BASE_URL`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::load_with_base_url(path, std::env::var(BASE_URL_ENV).ok())
    }

    /// Same as [`KasanehaConfig::load`] with an explicit base URL override.
    pub fn load_with_base_url(
        path: &str,
        base_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let base_url = base_url.filter(|u| !u.trim().is_empty());
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .set_override_option("api.base_url", base_url)?
            .build()?;
        s.try_deserialize()
    }
}

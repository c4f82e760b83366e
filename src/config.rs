use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::column::ColumnKind;

/// Environment variable overriding `store.api_key`.
pub const STORE_KEY_ENV: &str = "PODCAST_CONSOLE_STORE_KEY";

/// Environment variable overriding `webhook.url`.
pub const WEBHOOK_URL_ENV: &str = "PODCAST_CONSOLE_WEBHOOK_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub store: StoreConfig,

    pub webhook: WebhookConfig,

    pub submission: SubmissionConfig,

    pub list: ListConfig,

    pub columns: ColumnsConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    #[serde(default)]
    pub suppress_connection_errors: bool,

    /// Event bus buffer size (default: 100)
    pub event_bus_buffer_size: usize,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            suppress_connection_errors: false,
            event_bus_buffer_size: 100,
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 6790,
            cors_allowed_origins: vec![
                "http://localhost:6790".to_string(),
                "http://127.0.0.1:6790".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Rest,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// "rest" for the hosted table, "memory" for a local in-process table.
    pub backend: StoreBackend,

    /// Project URL; the table lives under `{url}/rest/v1/{table}`.
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub table: String,

    /// How often the change feed re-reads the table (default: 2000)
    pub change_feed_interval_ms: u64,

    /// Request timeout in seconds (default: 15)
    pub request_timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Rest,
            url: "http://localhost:54321".to_string(),
            api_key: None,
            table: "episodes".to_string(),
            change_feed_interval_ms: 2000,
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Workflow endpoint receiving `episodeName` + `pdfFile`. Empty disables the
    /// call; submissions then rely on polling alone.
    pub url: String,

    /// Request timeout in seconds (default: 120)
    pub request_timeout_seconds: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            request_timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Poll interval while waiting for generated scripts (default: 1000)
    pub poll_interval_ms: u64,

    /// Ceiling after which a submission resolves as timed out (default: 120)
    pub timeout_seconds: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ListConfig {
    /// Periodic full reload of the record list, 0 disables (default: 0)
    pub auto_refresh_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ColumnsConfig {
    /// Overrides of the declared column kinds, e.g. `episode_name = "text"`.
    pub kinds: HashMap<String, ColumnKind>,

    /// Replaces the built-in preferred column order when non-empty.
    pub preferred_order: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = HashMap::new();
        labels.insert("app".to_string(), "podcast-console".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Secrets may come from the environment (or a `.env` file) instead of the
    /// config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(STORE_KEY_ENV)
            && !key.is_empty()
        {
            self.store.api_key = Some(key);
        }

        if let Ok(url) = std::env::var(WEBHOOK_URL_ENV)
            && !url.is_empty()
        {
            self.webhook.url = url;
        }
    }

    /// Loads `.env` from the working directory if there is one.
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv().context("Failed to read .env file")?;
        }
        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("podcast-console").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".podcast-console").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Rest && self.store.url.is_empty() {
            anyhow::bail!("Store URL cannot be empty for the rest backend");
        }

        if self.store.table.is_empty() {
            anyhow::bail!("Store table name cannot be empty");
        }

        if self.submission.poll_interval_ms == 0 {
            anyhow::bail!("Submission poll interval must be > 0");
        }

        if self.submission.timeout_seconds * 1000 <= self.submission.poll_interval_ms {
            anyhow::bail!("Submission timeout must be longer than the poll interval");
        }

        if self.store.change_feed_interval_ms == 0 {
            anyhow::bail!("Change feed interval must be > 0");
        }

        Ok(())
    }

    #[must_use]
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.submission.poll_interval_ms)
    }

    #[must_use]
    pub fn submission_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.submission.timeout_seconds)
    }
}

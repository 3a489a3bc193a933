//! Configuration infrastructure
//!
//! Contains configuration loading and management for the batch engine.
//!
//! Every tunable the behavior depends on lives here instead of being
//! hardcoded: retry thresholds, backoff shape, concurrency bounds, cache
//! staleness, and the HTTP fetcher settings.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

/// Named default values, referenced by the `Default` impls below and by
/// tests that assert against the shipped configuration.
pub mod defaults {
    /// Bounded worker pool size for one batch.
    pub const CONCURRENCY_LIMIT: usize = 5;
    /// Wall-clock limit for a single processor attempt.
    pub const ITEM_TIMEOUT_SECONDS: u64 = 30;
    /// Terminal attempt cap for transient failures.
    pub const MAX_ATTEMPTS: u32 = 3;
    /// First backoff delay.
    pub const BACKOFF_BASE_MS: u64 = 1_000;
    /// Backoff ceiling.
    pub const BACKOFF_MAX_MS: u64 = 60_000;
    /// First backoff delay when a collaborator reports a quota problem.
    pub const QUOTA_BACKOFF_BASE_MS: u64 = 30_000;
    /// Jitter applied around each delay, as a fraction.
    pub const BACKOFF_JITTER: f64 = 0.2;
    /// HTTP requests per second across all workers.
    pub const MAX_REQUESTS_PER_SECOND: u32 = 10;
    /// Outbound request timeout.
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    /// Same-domain contact/about pages visited per lead check.
    pub const MAX_LEAD_SUBPAGES: usize = 3;
    /// Search results URL; `{query}` is replaced with the encoded query.
    pub const SEARCH_URL_TEMPLATE: &str = "https://html.duckduckgo.com/html/?q={query}";
    /// User agent for outbound requests.
    pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; Leadflow/0.2)";
}

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Batch execution settings.
    pub batch: BatchConfig,

    /// Retry and backoff settings.
    pub retry: RetryConfig,

    /// Row cache settings.
    pub cache: CacheConfig,

    /// Outbound HTTP settings.
    pub http: HttpConfig,

    /// Email drafting settings.
    pub email: EmailConfig,

    /// Search running settings.
    pub search: SearchConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Batch execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum items processed concurrently within one batch. The primary
    /// defense against overwhelming external rate limits.
    pub concurrency_limit: usize,

    /// Timeout for a single processor attempt, in seconds.
    pub item_timeout_seconds: u64,
}

/// Retry and backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per item, including the first.
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds.
    pub backoff_base_ms: u64,

    /// Backoff ceiling in milliseconds.
    pub backoff_max_ms: u64,

    /// Base backoff delay after a quota failure, in milliseconds.
    pub quota_backoff_base_ms: u64,

    /// Jitter fraction applied around each delay (0.2 = ±20%).
    pub backoff_jitter: f64,
}

/// Row cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache max age in seconds. `None` keeps a tab loaded for the whole
    /// process lifetime unless an explicit refresh is requested.
    pub ttl_seconds: Option<u64>,
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Requests per second across all workers.
    pub max_requests_per_second: u32,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// User agent string for outbound requests.
    pub user_agent: String,
}

/// Email drafting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Sender address placed on every draft.
    pub from_address: String,
}

/// Search running settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results page URL with a `{query}` placeholder.
    pub url_template: String,

    /// Same-domain pages visited per lead check.
    pub max_lead_subpages: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter: "error" | "warn" | "info" | "debug" | "trace".
    pub level: String,

    /// Whether to also write a rolling log file.
    pub file_enabled: bool,

    /// Directory for log files; defaults next to the executable.
    pub directory: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
            email: EmailConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: defaults::CONCURRENCY_LIMIT,
            item_timeout_seconds: defaults::ITEM_TIMEOUT_SECONDS,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            backoff_base_ms: defaults::BACKOFF_BASE_MS,
            backoff_max_ms: defaults::BACKOFF_MAX_MS,
            quota_backoff_base_ms: defaults::QUOTA_BACKOFF_BASE_MS,
            backoff_jitter: defaults::BACKOFF_JITTER,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: None }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from_address: "outreach@example.com".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url_template: defaults::SEARCH_URL_TEMPLATE.to_string(),
            max_lead_subpages: defaults::MAX_LEAD_SUBPAGES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false,
            directory: None,
        }
    }
}

impl EngineConfig {
    /// Item attempt timeout as a `Duration`.
    #[must_use]
    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.batch.item_timeout_seconds)
    }

    /// Cache TTL as a `Duration`, if one is configured.
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache.ttl_seconds.map(Duration::from_secs)
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("leadflow");

        Ok(config_dir)
    }

    /// Create a new configuration manager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        let config_path = config_dir.join("leadflow_config.json");

        Ok(Self { config_path })
    }

    /// Create a configuration manager reading from an explicit path
    #[must_use]
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<EngineConfig> {
        if !self.config_path.exists() {
            info!(
                "Configuration file not found, creating default: {:?}",
                self.config_path
            );
            let default_config = EngineConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        let config = serde_json::from_str::<EngineConfig>(&content)
            .with_context(|| format!("Failed to parse configuration: {:?}", self.config_path))?;

        info!("Loaded configuration from: {:?}", self.config_path);
        Ok(config)
    }

    /// Save configuration to file, creating the directory if needed
    pub async fn save_config(&self, config: &EngineConfig) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_creates_default_config_on_first_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("leadflow_config.json");
        let manager = ConfigManager::with_path(path.clone());

        let config = manager.load_config().await.expect("load");
        assert_eq!(config.batch.concurrency_limit, defaults::CONCURRENCY_LIMIT);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = ConfigManager::with_path(dir.path().join("leadflow_config.json"));

        let mut config = EngineConfig::default();
        config.batch.concurrency_limit = 2;
        config.retry.max_attempts = 7;
        config.cache.ttl_seconds = Some(600);
        manager.save_config(&config).await.expect("save");

        let loaded = manager.load_config().await.expect("load");
        assert_eq!(loaded.batch.concurrency_limit, 2);
        assert_eq!(loaded.retry.max_attempts, 7);
        assert_eq!(loaded.cache.ttl_seconds, Some(600));
    }
}

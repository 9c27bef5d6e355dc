//! Configuration management for statusd.
//!
//! Loads settings from `$STATUSD_CONFIG`, then /etc/statusd/config.toml,
//! or falls back to defaults. Environment variables override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use status_common::{Catalogue, ServiceDescriptor, StatusError};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/statusd/config.toml";

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "STATUSD_CONFIG";

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Upper bound for a single query-surface request
    #[serde(default = "default_request_budget")]
    pub request_budget_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:7870".to_string()
}

fn default_request_budget() -> u64 {
    12
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_budget_secs: default_request_budget(),
        }
    }
}

/// Background refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Tick interval in seconds
    #[serde(default = "default_tick_interval")]
    pub interval_secs: u64,

    /// Alert when more than this many services are down in one tick
    #[serde(default)]
    pub critical_threshold: usize,

    /// Alert destination; absence disables alerting
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_tick_interval() -> u64 {
    300 // every 5 minutes
}

fn default_webhook_timeout() -> u64 {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_tick_interval(),
            critical_threshold: 0,
            webhook_url: None,
            webhook_timeout_secs: default_webhook_timeout(),
        }
    }
}

/// Scraper tiers configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Outage aggregator site, no trailing slash
    #[serde(default = "default_aggregator_url")]
    pub aggregator_base_url: String,

    /// Detail page path; `{slug}` is replaced by the service slug
    #[serde(default = "default_detail_path")]
    pub detail_path: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Per-attempt timeout for both scraper tiers
    #[serde(default = "default_scraper_timeout")]
    pub scraper_timeout_secs: u64,

    /// Scrapers keep their own results this long
    #[serde(default = "default_scraper_ttl")]
    pub scraper_cache_ttl_secs: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_base")]
    pub retry_base_delay_ms: u64,

    /// Headline words that mark a problem on a detail page
    #[serde(default = "default_problem_keywords")]
    pub problem_keywords: Vec<String>,

    /// Headline phrases that positively state there is no problem
    #[serde(default = "default_calm_phrases")]
    pub calm_phrases: Vec<String>,
}

fn default_aggregator_url() -> String {
    "https://downdetector.com".to_string()
}

fn default_detail_path() -> String {
    "/status/{slug}/".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}

fn default_scraper_timeout() -> u64 {
    8
}

fn default_scraper_ttl() -> u64 {
    120
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base() -> u64 {
    1_000
}

fn default_problem_keywords() -> Vec<String> {
    ["problem", "outage", "falha", "instabilidade", "fora do ar"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub(crate) fn default_calm_phrases() -> Vec<String> {
    [
        "no current problems",
        "no current issues",
        "no problems",
        "sem problemas",
        "nenhum problema",
        "não há problemas",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            aggregator_base_url: default_aggregator_url(),
            detail_path: default_detail_path(),
            accept_language: default_accept_language(),
            scraper_timeout_secs: default_scraper_timeout(),
            scraper_cache_ttl_secs: default_scraper_ttl(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base(),
            problem_keywords: default_problem_keywords(),
            calm_phrases: default_calm_phrases(),
        }
    }
}

/// Generative-model tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model_name")]
    pub model: String,

    /// Credential; absence disables the tier
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,

    /// Model verdicts are reused this long, inconclusive ones included
    #[serde(default = "default_model_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_model_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model_name() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_model_timeout() -> u64 {
    8
}

fn default_model_cache_ttl() -> u64 {
    300
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            model: default_model_name(),
            api_key: None,
            timeout_secs: default_model_timeout(),
            cache_ttl_secs: default_model_cache_ttl(),
        }
    }
}

/// Orchestrator cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL of accepted statuses; a tunable trading freshness for politeness
    #[serde(default = "default_status_ttl")]
    pub status_ttl_secs: u64,

    /// Simultaneous per-service checks during an aggregate
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_status_ttl() -> u64 {
    300
}

fn default_concurrency() -> usize {
    6
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            status_ttl_secs: default_status_ttl(),
            concurrency: default_concurrency(),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Replaces the built-in catalogue when non-empty
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
}

impl Config {
    /// Load config from `$STATUSD_CONFIG` or the system path, apply the
    /// environment and validate.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load_from_path(&path)
                .with_context(|| format!("failed to load config from {}", path))?,
            Err(_) => Self::load_from_path(CONFIG_PATH).unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                Config::default()
            }),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load config from specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid TOML in {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay environment variables. `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("STATUSD_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("STATUSD_AGGREGATOR_URL") {
            self.sources.aggregator_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("STATUSD_TICK_SECS") {
            match v.parse() {
                Ok(secs) => self.scheduler.interval_secs = secs,
                Err(_) => warn!("Ignoring invalid STATUSD_TICK_SECS={}", v),
            }
        }
        if let Some(v) = lookup("STATUSD_CRITICAL_THRESHOLD") {
            match v.parse() {
                Ok(n) => self.scheduler.critical_threshold = n,
                Err(_) => warn!("Ignoring invalid STATUSD_CRITICAL_THRESHOLD={}", v),
            }
        }
        if let Some(v) = lookup("STATUSD_WEBHOOK_URL") {
            self.scheduler.webhook_url = non_empty(v);
        }
        if let Some(v) = lookup("STATUSD_MODEL_API_KEY").or_else(|| lookup("GEMINI_API_KEY")) {
            self.model.api_key = non_empty(v);
        }
    }

    pub fn validate(&self) -> Result<(), StatusError> {
        if self.scheduler.interval_secs == 0 {
            return Err(StatusError::Config(
                "scheduler.interval_secs must be greater than zero".into(),
            ));
        }
        if self.cache.concurrency == 0 {
            return Err(StatusError::Config(
                "cache.concurrency must be at least 1".into(),
            ));
        }
        if self.sources.retry_attempts == 0 {
            return Err(StatusError::Config(
                "sources.retry_attempts must be at least 1".into(),
            ));
        }
        if !self.sources.detail_path.contains("{slug}") {
            return Err(StatusError::Config(
                "sources.detail_path must contain {slug}".into(),
            ));
        }
        self.catalogue().map(|_| ())
    }

    /// Configured catalogue, or the built-in one when none is configured.
    pub fn catalogue(&self) -> Result<Catalogue, StatusError> {
        if self.services.is_empty() {
            Ok(Catalogue::default())
        } else {
            Catalogue::new(self.services.clone())
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_secs)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.status_ttl_secs)
    }

    pub fn request_budget(&self) -> Duration {
        Duration::from_secs(self.server.request_budget_secs)
    }

    /// Save default config to path (for init)
    pub fn save_default(path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&Config::default())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        info!("Saved default config to {}", path.display());
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler.interval_secs, 300);
        assert_eq!(config.sources.retry_attempts, 3);
        assert_eq!(config.sources.retry_base_delay_ms, 1_000);
        assert!(config.model.api_key.is_none());
        assert!(config.scheduler.webhook_url.is_none());
        assert_eq!(config.model.cache_ttl_secs, 300);
        assert!(config.sources.calm_phrases.iter().any(|p| p == "no problems"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_with_defaults() {
        let toml_str = r#"
[scheduler]
interval_secs = 60
critical_threshold = 2

[sources]
aggregator_base_url = "https://example.test"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler.interval_secs, 60);
        assert_eq!(config.scheduler.critical_threshold, 2);
        assert_eq!(config.sources.aggregator_base_url, "https://example.test");
        // Defaults for missing fields
        assert_eq!(config.sources.scraper_timeout_secs, 8);
        assert_eq!(config.cache.concurrency, 6);
    }

    #[test]
    fn test_custom_catalogue() {
        let toml_str = r#"
[[services]]
id = "examplepay"
display_name = "ExamplePay"
keywords = ["epay"]

[[services]]
id = "smallservice"
display_name = "Small Service"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let catalogue = config.catalogue().unwrap();
        assert_eq!(catalogue.ids(), vec!["examplepay", "smallservice"]);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("STATUSD_TICK_SECS", "30"),
            ("STATUSD_AGGREGATOR_URL", "https://mirror.test/"),
            ("GEMINI_API_KEY", "secret"),
            ("STATUSD_WEBHOOK_URL", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.scheduler.interval_secs, 30);
        assert_eq!(config.sources.aggregator_base_url, "https://mirror.test");
        assert_eq!(config.model.api_key.as_deref(), Some("secret"));
        assert!(config.scheduler.webhook_url.is_none(), "blank webhook disables alerting");
    }

    #[test]
    fn test_invalid_tick_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(|k| (k == "STATUSD_TICK_SECS").then(|| "soon".to_string()));
        assert_eq!(config.scheduler.interval_secs, 300);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.scheduler.interval_secs = 0;
        assert!(matches!(config.validate(), Err(StatusError::Config(_))));
    }

    #[test]
    fn test_load_from_path_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statusd").join("config.toml");
        Config::save_default(&path).unwrap();
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.server.bind, default_bind());
        assert_eq!(loaded.cache.status_ttl_secs, 300);
    }
}

//! Configuration loading
//!
//! Settings come from a TOML file (default `<config dir>/logscope/config.toml`)
//! and are then overridden by `LOGSCOPE_*` environment variables. A missing
//! default file simply means defaults; an explicitly named file must exist.

use anyhow::{anyhow, Result};
use logscope_fetch::FetchConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_SITE: &str = "LOGSCOPE_SITE";
pub const ENV_BASE_URL: &str = "LOGSCOPE_BASE_URL";
pub const ENV_API_KEY: &str = "LOGSCOPE_API_KEY";
pub const ENV_APP_KEY: &str = "LOGSCOPE_APP_KEY";
pub const ENV_LOG_LEVEL: &str = "LOGSCOPE_LOG_LEVEL";
pub const ENV_MAX_PAGES: &str = "LOGSCOPE_MAX_PAGES";
pub const ENV_MAX_RECORDS: &str = "LOGSCOPE_MAX_RECORDS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogscopeConfig {
    pub datadog: DatadogConfig,
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
    pub query: QuerySettings,
    pub logging: LoggingConfig,
}

/// Remote service site and credentials
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatadogConfig {
    pub site: String,
    /// Overrides the URL derived from `site`
    pub base_url: Option<String>,
    pub api_key: String,
    pub app_key: String,
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            site: "datadoghq.com".to_string(),
            base_url: None,
            api_key: String::new(),
            app_key: String::new(),
        }
    }
}

impl std::fmt::Debug for DatadogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatadogConfig")
            .field("site", &self.site)
            .field("base_url", &self.base_url)
            .field("api_key_set", &!self.api_key.is_empty())
            .field("app_key_set", &!self.app_key.is_empty())
            .finish()
    }
}

/// Freshness windows per query kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub logs_ttl_secs: u64,
    pub volume_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            logs_ttl_secs: 30,
            volume_ttl_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn logs_ttl(&self) -> Duration {
        Duration::from_secs(self.logs_ttl_secs)
    }

    pub fn volume_ttl(&self) -> Duration {
        Duration::from_secs(self.volume_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Records returned when a query gives no limit
    pub default_limit: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self { default_limit: 1_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub level: String,
    pub json: bool,
    /// Also write logs to this file
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

/// Resolves, reads and overrides configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    explicit_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            explicit_path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// `<config dir>/logscope/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(dir.join("logscope").join("config.toml"))
    }

    /// Load the file, then apply environment overrides and validate
    pub fn load(&self) -> Result<LogscopeConfig> {
        let mut config = self.load_file()?;
        Self::apply_env_overrides(&mut config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn load_file(&self) -> Result<LogscopeConfig> {
        let path = match &self.explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(anyhow!("Configuration file not found: {:?}", path));
                }
                path.clone()
            }
            None => match Self::default_path() {
                Ok(path) if path.exists() => path,
                _ => {
                    debug!("No configuration file, using defaults");
                    return Ok(LogscopeConfig::default());
                }
            },
        };

        let content = fs::read_to_string(&path)
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;
        let config = Self::parse(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;
        debug!(?path, "Loaded configuration file");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<LogscopeConfig> {
        toml::from_str(content).map_err(|e| anyhow!("Failed to parse TOML config: {}", e))
    }

    /// Apply `LOGSCOPE_*` overrides from the process environment
    pub fn apply_env_overrides(config: &mut LogscopeConfig) -> Result<()> {
        Self::apply_overrides(config, |name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides<F>(config: &mut LogscopeConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(site) = lookup(ENV_SITE) {
            config.datadog.site = site;
            debug!("Applied env override for site");
        }
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.datadog.base_url = Some(base_url).filter(|u| !u.is_empty());
            debug!("Applied env override for base URL");
        }
        if let Some(api_key) = lookup(ENV_API_KEY) {
            config.datadog.api_key = api_key;
            debug!("Applied env override for API key");
        }
        if let Some(app_key) = lookup(ENV_APP_KEY) {
            config.datadog.app_key = app_key;
            debug!("Applied env override for application key");
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.logging.level = level;
            debug!("Applied env override for log level");
        }
        if let Some(max_pages) = lookup(ENV_MAX_PAGES) {
            config.fetch.max_pages = max_pages
                .trim()
                .parse()
                .map_err(|e| anyhow!("Invalid {}='{}': {}", ENV_MAX_PAGES, max_pages, e))?;
            debug!("Applied env override for max pages");
        }
        if let Some(max_records) = lookup(ENV_MAX_RECORDS) {
            config.fetch.max_records = max_records
                .trim()
                .parse()
                .map_err(|e| anyhow!("Invalid {}='{}': {}", ENV_MAX_RECORDS, max_records, e))?;
            debug!("Applied env override for max records");
        }
        Ok(())
    }

    pub fn validate(config: &LogscopeConfig) -> Result<()> {
        config.fetch.validate().map_err(|e| anyhow!(e))?;
        if config.query.default_limit == 0 {
            return Err(anyhow!("query.default_limit must be > 0"));
        }
        if config.datadog.base_url.is_none() {
            logscope_fetch::transport::base_url_for_site(&config.datadog.site)
                .map_err(|e| anyhow!("{}", e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = LogscopeConfig::default();
        assert_eq!(config.datadog.site, "datadoghq.com");
        assert_eq!(config.cache.logs_ttl(), Duration::from_secs(30));
        assert_eq!(config.cache.volume_ttl(), Duration::from_secs(60));
        assert_eq!(config.query.default_limit, 1_000);
        assert_eq!(config.fetch, FetchConfig::default());
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = ConfigLoader::parse(
            r#"
[datadog]
site = "datadoghq.eu"
api_key = "abc"

[fetch]
max_pages = 5

[cache]
logs_ttl_secs = 10
"#,
        )
        .unwrap();
        assert_eq!(config.datadog.site, "datadoghq.eu");
        assert_eq!(config.datadog.app_key, "");
        assert_eq!(config.fetch.max_pages, 5);
        assert_eq!(config.fetch.page_size, 1_000);
        assert_eq!(config.cache.logs_ttl_secs, 10);
        assert_eq!(config.cache.volume_ttl_secs, 60);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_SITE, "us5.datadoghq.com"),
            (ENV_API_KEY, "env-api"),
            (ENV_MAX_PAGES, "7"),
            (ENV_LOG_LEVEL, "debug"),
        ]);
        let mut config = LogscopeConfig::default();
        ConfigLoader::apply_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.datadog.site, "us5.datadoghq.com");
        assert_eq!(config.datadog.api_key, "env-api");
        assert_eq!(config.fetch.max_pages, 7);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.fetch.max_records, 5_000);
    }

    #[test]
    fn test_bad_numeric_override() {
        let mut config = LogscopeConfig::default();
        let err = ConfigLoader::apply_overrides(&mut config, |k| {
            (k == ENV_MAX_RECORDS).then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_RECORDS));
    }

    #[test]
    fn test_unknown_site_rejected_without_base_url() {
        let mut config = LogscopeConfig::default();
        config.datadog.site = "example.com".to_string();
        assert!(ConfigLoader::validate(&config).is_err());
        config.datadog.base_url = Some("http://localhost:8126".to_string());
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_debug_hides_keys() {
        let config = DatadogConfig {
            api_key: "super-secret".to_string(),
            ..DatadogConfig::default()
        };
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}

//! Fetch limits and budgets

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits applied by the fetch engine
///
/// Durations are stored in milliseconds so the struct maps one-to-one onto
/// the `[fetch]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Simultaneous outbound requests across all queries
    pub gate_capacity: usize,

    /// Additional attempts after a rate-limited one
    pub max_retries: u32,

    /// First retry delay; doubles per retry
    pub base_delay_ms: u64,

    /// Ceiling for any single retry delay
    pub max_delay_ms: u64,

    /// Deadline for one page request, gate wait excluded
    pub page_timeout_ms: u64,

    pub page_size: usize,
    pub max_pages: usize,
    pub max_records: usize,

    /// Pause before page N+1 is `N * inter_page_delay_ms`, capped at `max_delay_ms`
    pub inter_page_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            gate_capacity: 5,
            max_retries: 2,
            base_delay_ms: 3_000,
            max_delay_ms: 15_000,
            page_timeout_ms: 30_000, // 30 seconds
            page_size: 1_000,
            max_pages: 3,
            max_records: 5_000,
            inter_page_delay_ms: 1_000,
        }
    }
}

impl FetchConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn inter_page_delay(&self) -> Duration {
        Duration::from_millis(self.inter_page_delay_ms)
    }

    /// Check that no limit is zero
    pub fn validate(&self) -> Result<(), String> {
        let checks = [
            ("gate_capacity", self.gate_capacity as u64),
            ("page_timeout_ms", self.page_timeout_ms),
            ("page_size", self.page_size as u64),
            ("max_pages", self.max_pages as u64),
            ("max_records", self.max_records as u64),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(format!("fetch.{name} must be > 0"));
            }
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("fetch.max_delay_ms must be >= fetch.base_delay_ms".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.gate_capacity, 5);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.base_delay(), Duration::from_secs(3));
        assert_eq!(config.max_delay(), Duration::from_secs(15));
        assert_eq!(config.page_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_table_uses_defaults() {
        let config: FetchConfig = serde_json::from_str(r#"{"max_pages": 10}"#).unwrap();
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.page_size, 1_000);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = FetchConfig {
            gate_capacity: 0,
            ..FetchConfig::default()
        };
        assert_eq!(config.validate().unwrap_err(), "fetch.gate_capacity must be > 0");

        let config = FetchConfig {
            max_delay_ms: 10,
            ..FetchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, MAX_TILE_AGE_SECS_LIMIT};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent`, `cache_prefix` or `app_version` is empty
    /// - `max_tile_age_secs` is 0 or exceeds 365 days
    /// - `origin` is not an absolute http(s) URL
    /// - any `tile_patterns` entry is not a valid regex
    ///
    /// Returns `ConfigError::Missing` if `tile_patterns` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }
        if self.cache_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }
        if self.app_version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "app_version".into(), reason: "must not be empty".into() });
        }

        if self.max_tile_age_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "max_tile_age_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_tile_age_secs > MAX_TILE_AGE_SECS_LIMIT {
            return Err(ConfigError::Invalid {
                field: "max_tile_age_secs".into(),
                reason: "must not exceed 365 days".into(),
            });
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            Ok(origin) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("unsupported scheme: {}", origin.scheme()),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() }),
        }

        if self.tile_patterns.is_empty() {
            return Err(ConfigError::Missing {
                field: "tile_patterns".into(),
                hint: "At least one tile provider pattern is required".into(),
            });
        }
        for pattern in &self.tile_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::Invalid { field: "tile_patterns".into(), reason: e.to_string() });
            }
        }

        if self.bootstrap_paths.is_empty() {
            tracing::warn!("bootstrap_paths is empty; install will not pre-warm the static generation");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() }; // 5min 1sec
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_version() {
        let config = AppConfig { app_version: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "app_version"));
    }

    #[test]
    fn test_validate_zero_tile_age() {
        let config = AppConfig { max_tile_age_secs: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_tile_age_secs"));
    }

    #[test]
    fn test_validate_tile_age_upper_bound() {
        let config = AppConfig { max_tile_age_secs: MAX_TILE_AGE_SECS_LIMIT, ..Default::default() };
        assert!(config.validate().is_ok());

        for secs in [MAX_TILE_AGE_SECS_LIMIT + 1, 10_000_000_000_000_000, u64::MAX] {
            let config = AppConfig { max_tile_age_secs: secs, ..Default::default() };
            let result = config.validate();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_tile_age_secs"));
        }
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));

        let config = AppConfig { origin: "ftp://example.com".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_bad_pattern() {
        let config = AppConfig { tile_patterns: vec!["(unclosed".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "tile_patterns"));
    }

    #[test]
    fn test_validate_no_patterns() {
        let config = AppConfig { tile_patterns: Vec::new(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_bytes: 1, timeout_ms: 100, max_tile_age_secs: 1, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}

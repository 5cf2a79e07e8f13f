//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TILEGATE_*)
//! 2. TOML config file (if TILEGATE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Tile provider URL patterns: styles endpoint, versioned data endpoint,
/// sub-domain tile hosts, and versioned endpoints on generic tile API hosts.
pub const DEFAULT_TILE_PATTERNS: [&str; 4] = [
    r"^https://api\.mapbox\.com/styles/v1/",
    r"^https://api\.mapbox\.com/v4/",
    r"^https://[a-z0-9-]+\.tiles\.mapbox\.com/",
    r"^https://api\.([a-z0-9-]+\.)*tiles\.com/v\d+/",
];

/// Application shell pre-warmed into the static generation on install.
pub const DEFAULT_BOOTSTRAP_PATHS: [&str; 4] = ["/", "/index.html", "/assets/index.css", "/assets/index.js"];

/// URL substrings that force passthrough: the API segment and the backend service segment.
pub const DEFAULT_EXCLUDED_MARKERS: [&str; 2] = ["/api/", "/rest/v1/"];

/// Upper bound on `max_tile_age_secs` (365 days).
pub const MAX_TILE_AGE_SECS_LIMIT: u64 = 365 * 24 * 60 * 60;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TILEGATE_*)
/// 2. TOML config file (if TILEGATE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version string embedded in every generation name.
    ///
    /// Set via TILEGATE_APP_VERSION environment variable.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Prefix shared by every generation name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Path to SQLite cache database.
    ///
    /// Set via TILEGATE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base URL that bootstrap paths are resolved against.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network fetch timeout in milliseconds.
    ///
    /// Set via TILEGATE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes accepted per network response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Freshness window for tile entries, in seconds.
    #[serde(default = "default_max_tile_age_secs")]
    pub max_tile_age_secs: u64,

    /// Regex patterns identifying tile provider URLs.
    #[serde(default = "default_tile_patterns")]
    pub tile_patterns: Vec<String>,

    /// Application shell paths pre-warmed on install.
    #[serde(default = "default_bootstrap_paths")]
    pub bootstrap_paths: Vec<String>,

    /// URL substrings that are never cached.
    #[serde(default = "default_excluded_markers")]
    pub excluded_markers: Vec<String>,

    /// Activate right after install instead of waiting for SKIP_WAITING.
    #[serde(default = "default_true")]
    pub auto_activate: bool,
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

fn default_cache_prefix() -> String {
    "tilegate".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tilegate-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_user_agent() -> String {
    "tilegate/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_max_tile_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_tile_patterns() -> Vec<String> {
    DEFAULT_TILE_PATTERNS.iter().map(|p| p.to_string()).collect()
}

fn default_bootstrap_paths() -> Vec<String> {
    DEFAULT_BOOTSTRAP_PATHS.iter().map(|p| p.to_string()).collect()
}

fn default_excluded_markers() -> Vec<String> {
    DEFAULT_EXCLUDED_MARKERS.iter().map(|p| p.to_string()).collect()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_version: default_app_version(),
            cache_prefix: default_cache_prefix(),
            db_path: default_db_path(),
            origin: default_origin(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_tile_age_secs: default_max_tile_age_secs(),
            tile_patterns: default_tile_patterns(),
            bootstrap_paths: default_bootstrap_paths(),
            excluded_markers: default_excluded_markers(),
            auto_activate: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Tile freshness window as a chrono duration.
    ///
    /// Saturates at `TimeDelta::MAX` for values `validate()` rejects.
    pub fn max_tile_age(&self) -> chrono::Duration {
        i64::try_from(self.max_tile_age_secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .unwrap_or(chrono::TimeDelta::MAX)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TILEGATE_`
    /// 2. TOML file from `TILEGATE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TILEGATE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TILEGATE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

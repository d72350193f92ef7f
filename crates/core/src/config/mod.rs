//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PAGEWALK_*)
//! 2. TOML config file (if PAGEWALK_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Settings that can change while the store is running (cache capacity,
//! preload radius) are read through [`SharedConfig`] on every operation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PAGEWALK_*)
/// 2. TOML config file (if PAGEWALK_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite gallery database.
    ///
    /// Set via PAGEWALK_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PAGEWALK_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via PAGEWALK_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of preloaded resource URLs kept per gallery.
    ///
    /// Set via PAGEWALK_CACHE_CAPACITY environment variable.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Number of neighbours on each side whose previews are refreshed after a navigation.
    ///
    /// Set via PAGEWALK_PRELOAD_RADIUS environment variable.
    #[serde(default = "default_preload_radius")]
    pub preload_radius: usize,

    /// Distance from the end of the known sequence at which the next source page is indexed ahead of time.
    ///
    /// Set via PAGEWALK_PROACTIVE_INDEX_DISTANCE environment variable.
    #[serde(default = "default_proactive_index_distance")]
    pub proactive_index_distance: usize,

    /// Attempts per page fetch before giving up.
    ///
    /// Set via PAGEWALK_FETCH_MAX_ATTEMPTS environment variable.
    #[serde(default = "default_fetch_max_attempts")]
    pub fetch_max_attempts: u32,

    /// Base retry delay in milliseconds; attempt `n` waits `n` times this.
    ///
    /// Set via PAGEWALK_FETCH_RETRY_DELAY_MS environment variable.
    #[serde(default = "default_fetch_retry_delay_ms")]
    pub fetch_retry_delay_ms: u64,

    /// CSS selector for item links inside a gallery listing page.
    #[serde(default = "default_item_selector")]
    pub item_selector: String,

    /// CSS selector for the resource element on an item page.
    #[serde(default = "default_image_selector")]
    pub image_selector: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pagewalk-cache.sqlite")
}

fn default_user_agent() -> String {
    "pagewalk/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_cache_capacity() -> usize {
    50
}

fn default_preload_radius() -> usize {
    3
}

fn default_proactive_index_distance() -> usize {
    10
}

fn default_fetch_max_attempts() -> u32 {
    3
}

fn default_fetch_retry_delay_ms() -> u64 {
    1_000
}

fn default_item_selector() -> String {
    "#gdt a[href]".into()
}

fn default_image_selector() -> String {
    "img#img".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            cache_capacity: default_cache_capacity(),
            preload_radius: default_preload_radius(),
            proactive_index_distance: default_proactive_index_distance(),
            fetch_max_attempts: default_fetch_max_attempts(),
            fetch_retry_delay_ms: default_fetch_retry_delay_ms(),
            item_selector: default_item_selector(),
            image_selector: default_image_selector(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Retry step as Duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_delay_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PAGEWALK_`
    /// 2. TOML file from `PAGEWALK_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("PAGEWALK_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PAGEWALK_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

/// Runtime configuration shared between the store and reader sessions.
///
/// Readers take a fresh [`snapshot`](Self::snapshot) per operation so that
/// updates apply to the next call without restarting anything.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<AppConfig>>,
}

impl SharedConfig {
    pub fn new(config: AppConfig) -> Self {
        Self { inner: Arc::new(RwLock::new(config)) }
    }

    /// Copy of the current configuration.
    pub async fn snapshot(&self) -> AppConfig {
        self.inner.read().await.clone()
    }

    /// Current preload cache capacity.
    pub async fn cache_capacity(&self) -> usize {
        self.inner.read().await.cache_capacity
    }

    /// Apply a change, keeping the previous value if the result fails validation.
    pub async fn update(&self, change: impl FnOnce(&mut AppConfig)) -> Result<(), ConfigError> {
        let mut guard = self.inner.write().await;
        let mut next = guard.clone();
        change(&mut next);
        next.validate()?;
        tracing::debug!(
            cache_capacity = next.cache_capacity,
            preload_radius = next.preload_radius,
            "configuration updated"
        );
        *guard = next;
        Ok(())
    }
}

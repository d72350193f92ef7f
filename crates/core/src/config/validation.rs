//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_capacity` is 0 or exceeds 10000
    /// - `fetch_max_attempts` is 0 or exceeds 10
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or either selector is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(invalid("cache_capacity", "must be greater than 0"));
        }
        if self.cache_capacity > 10_000 {
            return Err(invalid("cache_capacity", "must not exceed 10000"));
        }

        if self.fetch_max_attempts == 0 {
            return Err(invalid("fetch_max_attempts", "must be at least 1"));
        }
        if self.fetch_max_attempts > 10 {
            return Err(invalid("fetch_max_attempts", "must not exceed 10"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.item_selector.trim().is_empty() {
            return Err(invalid("item_selector", "must not be empty"));
        }
        if self.image_selector.trim().is_empty() {
            return Err(invalid("image_selector", "must not be empty"));
        }

        if self.proactive_index_distance == 0 {
            tracing::warn!("proactive_index_distance is 0; next pages are only indexed on demand");
        }

        Ok(())
    }
}

//! Engine configuration from the environment

use crate::execute::DEFAULT_FAILURE_SAMPLE;
use crate::plan::DEFAULT_ACTION_CAP;
use chrono::Duration;

/// Tunables shared by every flow
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Safety cap on executable items per bulk action
    pub action_cap: usize,
    /// Failure reasons kept in an execution report
    pub failure_sample: usize,
    /// Platform age limit for message deletion, in days
    pub message_max_age_days: u32,
    /// Items listed per preview page
    pub page_size: usize,
    /// Messages fetched for a purge preview
    pub fetch_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            action_cap: DEFAULT_ACTION_CAP,
            failure_sample: DEFAULT_FAILURE_SAMPLE,
            message_max_age_days: 14,
            page_size: 10,
            fetch_limit: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            action_cap: env_or("INTERACTION_ACTION_CAP", defaults.action_cap),
            failure_sample: env_or("INTERACTION_FAILURE_SAMPLE", defaults.failure_sample),
            message_max_age_days: env_or(
                "INTERACTION_MESSAGE_MAX_AGE_DAYS",
                defaults.message_max_age_days,
            ),
            page_size: env_or("INTERACTION_PAGE_SIZE", defaults.page_size).max(1),
            fetch_limit: env_or("INTERACTION_FETCH_LIMIT", defaults.fetch_limit),
        }
    }

    pub fn message_max_age(&self) -> Duration {
        Duration::days(i64::from(self.message_max_age_days))
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_engine_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.action_cap, DEFAULT_ACTION_CAP);
        assert_eq!(config.failure_sample, DEFAULT_FAILURE_SAMPLE);
        assert_eq!(config.message_max_age(), Duration::days(14));
    }
}

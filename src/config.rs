//! Guard configuration
//!
//! Evidence windows and log bounds. Every field has a default so a partial
//! JSON document deserializes into a usable config.

use crate::error::{GuardError, Result};
use serde::{Deserialize, Serialize};

/// Timing windows and capacities used by the decision engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardConfig {
    /// How long a pointer/key gesture counts as user intent (ms)
    #[serde(default = "default_gesture_window_ms")]
    pub gesture_window_ms: u64,

    /// How long a context-menu gesture counts as user intent (ms)
    ///
    /// Wider than `gesture_window_ms`: choosing "open in new tab" from the
    /// menu can take a few seconds.
    #[serde(default = "default_context_menu_window_ms")]
    pub context_menu_window_ms: u64,

    /// How long a clicked link stays usable as navigation evidence (ms)
    #[serde(default = "default_click_match_window_ms")]
    pub click_match_window_ms: u64,

    /// Lifetime of a spawned tab's opener context (ms)
    #[serde(default = "default_new_tab_context_ttl_ms")]
    pub new_tab_context_ttl_ms: u64,

    /// How long a pending restore waits for its own commit (ms)
    #[serde(default = "default_restore_window_ms")]
    pub restore_window_ms: u64,

    /// Maximum number of blocked events kept in the log
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,

    /// Number of entries returned by log queries
    #[serde(default = "default_log_query_limit")]
    pub log_query_limit: usize,
}

fn default_gesture_window_ms() -> u64 {
    1_500
}

fn default_context_menu_window_ms() -> u64 {
    8_000
}

fn default_click_match_window_ms() -> u64 {
    3_000
}

fn default_new_tab_context_ttl_ms() -> u64 {
    15_000
}

fn default_restore_window_ms() -> u64 {
    5_000
}

fn default_max_log_entries() -> usize {
    100
}

fn default_log_query_limit() -> usize {
    50
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            gesture_window_ms: default_gesture_window_ms(),
            context_menu_window_ms: default_context_menu_window_ms(),
            click_match_window_ms: default_click_match_window_ms(),
            new_tab_context_ttl_ms: default_new_tab_context_ttl_ms(),
            restore_window_ms: default_restore_window_ms(),
            max_log_entries: default_max_log_entries(),
            log_query_limit: default_log_query_limit(),
        }
    }
}

impl GuardConfig {
    /// Reject configs with zero-length windows or capacities
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("gestureWindowMs", self.gesture_window_ms),
            ("contextMenuWindowMs", self.context_menu_window_ms),
            ("clickMatchWindowMs", self.click_match_window_ms),
            ("newTabContextTtlMs", self.new_tab_context_ttl_ms),
            ("restoreWindowMs", self.restore_window_ms),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(GuardError::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.max_log_entries == 0 {
            return Err(GuardError::Config(
                "maxLogEntries must be greater than 0".to_string(),
            ));
        }
        if self.log_query_limit > self.max_log_entries {
            return Err(GuardError::Config(format!(
                "logQueryLimit ({}) exceeds maxLogEntries ({})",
                self.log_query_limit, self.max_log_entries
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows() {
        let config = GuardConfig::default();
        assert_eq!(config.gesture_window_ms, 1_500);
        assert_eq!(config.context_menu_window_ms, 8_000);
        assert_eq!(config.click_match_window_ms, 3_000);
        assert_eq!(config.new_tab_context_ttl_ms, 15_000);
        assert_eq!(config.restore_window_ms, 5_000);
        assert_eq!(config.max_log_entries, 100);
        assert_eq!(config.log_query_limit, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: GuardConfig =
            serde_json::from_str(r#"{"gestureWindowMs": 900}"#).unwrap();
        assert_eq!(config.gesture_window_ms, 900);
        assert_eq!(config.click_match_window_ms, 3_000);
        assert_eq!(config.max_log_entries, 100);
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = GuardConfig {
            restore_window_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("restoreWindowMs"));
    }

    #[test]
    fn test_validate_rejects_query_limit_above_capacity() {
        let config = GuardConfig {
            max_log_entries: 10,
            log_query_limit: 20,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GuardError::Config(_))));
    }
}

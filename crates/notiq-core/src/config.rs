//! Queue and arbiter configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Per-queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Period of the automatic commit in milliseconds (default 2000).
    pub despatch_interval_ms: u64,
    /// Drop items repeating the kind and signature of an earlier item in
    /// the same batch (default false).
    pub collapse_duplicates: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            despatch_interval_ms: 2_000,
            collapse_duplicates: false,
        }
    }
}

impl QueueConfig {
    pub fn despatch_interval(&self) -> Duration {
        Duration::from_millis(self.despatch_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.despatch_interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "despatch_interval_ms",
            });
        }
        Ok(())
    }
}

/// Retention rules for items the arbiter could not deliver yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeferPolicy {
    /// Maximum age of a deferred entry in milliseconds (default 600_000 = 10min).
    pub ttl_ms: u64,
    /// Retry cycles an entry may stay blocked before it is dropped (default 20).
    pub max_attempts: u32,
    /// Maximum number of deferred entries; the oldest is evicted first (default 256).
    pub capacity: usize,
}

impl Default for DeferPolicy {
    fn default() -> Self {
        Self {
            ttl_ms: 600_000,
            max_attempts: 20,
            capacity: 256,
        }
    }
}

/// Settings for a presentation arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// How long a modal request waits for the slot before it is deferred
    /// (default 30_000).
    pub modal_wait_timeout_ms: u64,
    pub defer: DeferPolicy,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            modal_wait_timeout_ms: 30_000,
            defer: DeferPolicy::default(),
        }
    }
}

impl ArbiterConfig {
    pub fn modal_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.modal_wait_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modal_wait_timeout_ms == 0 {
            return Err(ConfigError::Zero {
                field: "modal_wait_timeout_ms",
            });
        }
        if self.defer.ttl_ms == 0 {
            return Err(ConfigError::Zero {
                field: "defer.ttl_ms",
            });
        }
        if self.defer.capacity == 0 {
            return Err(ConfigError::Zero {
                field: "defer.capacity",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let q = QueueConfig::default();
        assert_eq!(q.despatch_interval(), Duration::from_secs(2));
        assert!(!q.collapse_duplicates);

        let a = ArbiterConfig::default();
        assert_eq!(a.modal_wait_timeout(), Duration::from_secs(30));
        assert_eq!(a.defer.max_attempts, 20);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ArbiterConfig =
            serde_json::from_str(r#"{"defer":{"capacity":8}}"#).expect("parse");
        assert_eq!(cfg.defer.capacity, 8);
        assert_eq!(cfg.defer.ttl_ms, 600_000);
        assert_eq!(cfg.modal_wait_timeout_ms, 30_000);
    }

    #[test]
    fn zero_values_rejected() {
        let q = QueueConfig {
            despatch_interval_ms: 0,
            ..QueueConfig::default()
        };
        assert!(matches!(
            q.validate(),
            Err(ConfigError::Zero {
                field: "despatch_interval_ms"
            })
        ));

        let mut a = ArbiterConfig::default();
        a.defer.capacity = 0;
        assert!(a.validate().is_err());
    }
}

//! Error types for delivery, presentation, and configuration.
//!
//! None of these ever reach a producer: `add_*` calls cannot fail. They are
//! returned per item from the arbiter and tallied by the committing queue.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which suppression stage dropped an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// The queue's own `FilterSet`.
    Queue,
    /// Duplicate of an earlier item in the same batch.
    Duplicate,
    /// The arbiter's process-wide list.
    Arbiter,
}

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("presentation rejected: {0}")]
    Rejected(String),

    #[error("presentation surface unavailable")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("empty item ignored")]
    InputIgnored,

    #[error("item suppressed by {stage:?} filter")]
    FilteredOut { stage: FilterStage },

    #[error("network unreachable, item deferred")]
    DeferredUnreachable,

    #[error("modal slot still busy after {waited_ms}ms, item deferred")]
    ModalWaitTimedOut { waited_ms: u64 },

    #[error(transparent)]
    PresentationFailed(#[from] PresentError),
}

impl DeliveryError {
    /// The item is still held by the arbiter and will be retried.
    pub fn is_deferred(&self) -> bool {
        matches!(
            self,
            Self::DeferredUnreachable | Self::ModalWaitTimedOut { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

//! Network reachability as seen by the arbiter.
//!
//! The probing mechanism lives outside this workspace; it only has to
//! implement [`ConnectivityOracle`].

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    #[default]
    Unknown,
    Reachable,
    Unreachable,
}

impl Reachability {
    /// Only a definite `Unreachable` blocks delivery.
    pub fn blocks_delivery(self) -> bool {
        self == Self::Unreachable
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Reachable => 1,
            Self::Unreachable => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Reachable,
            2 => Self::Unreachable,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Reachable => "reachable",
            Self::Unreachable => "unreachable",
        })
    }
}

/// Read-only view of current network reachability.
pub trait ConnectivityOracle: Send + Sync {
    fn reachability(&self) -> Reachability;

    fn is_reachable(&self) -> bool {
        self.reachability() == Reachability::Reachable
    }
}

/// Oracle holding a value set by its owner.
#[derive(Debug, Default)]
pub struct StaticOracle {
    state: AtomicU8,
}

impl StaticOracle {
    pub fn new(initial: Reachability) -> Self {
        Self {
            state: AtomicU8::new(initial.to_u8()),
        }
    }

    pub fn set(&self, reachability: Reachability) {
        self.state.store(reachability.to_u8(), Ordering::Release);
    }
}

impl ConnectivityOracle for StaticOracle {
    fn reachability(&self) -> Reachability {
        Reachability::from_u8(self.state.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unreachable_blocks() {
        assert!(Reachability::Unreachable.blocks_delivery());
        assert!(!Reachability::Unknown.blocks_delivery());
        assert!(!Reachability::Reachable.blocks_delivery());
    }

    #[test]
    fn static_oracle_roundtrip() {
        let oracle = StaticOracle::default();
        assert_eq!(oracle.reachability(), Reachability::Unknown);
        assert!(!oracle.is_reachable());

        oracle.set(Reachability::Reachable);
        assert!(oracle.is_reachable());

        oracle.set(Reachability::Unreachable);
        assert_eq!(oracle.reachability(), Reachability::Unreachable);
    }
}

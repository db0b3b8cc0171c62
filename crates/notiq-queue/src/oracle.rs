//! Reachability oracle backed by a tokio `watch` channel, so the arbiter
//! can both poll the current value and be woken on changes.

use tokio::sync::watch;

use notiq_core::{ConnectivityOracle, Reachability};

#[derive(Debug)]
pub struct WatchOracle {
    tx: watch::Sender<Reachability>,
}

impl WatchOracle {
    pub fn new(initial: Reachability) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new value. Subscribers are only woken on an actual change.
    pub fn set(&self, reachability: Reachability) {
        self.tx.send_if_modified(|current| {
            if *current == reachability {
                return false;
            }
            tracing::debug!(from = %current, to = %reachability, "reachability changed");
            *current = reachability;
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<Reachability> {
        self.tx.subscribe()
    }
}

impl Default for WatchOracle {
    fn default() -> Self {
        Self::new(Reachability::Unknown)
    }
}

impl ConnectivityOracle for WatchOracle {
    fn reachability(&self) -> Reachability {
        *self.tx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_latest_value() {
        let oracle = WatchOracle::new(Reachability::Unreachable);
        assert_eq!(oracle.reachability(), Reachability::Unreachable);
        oracle.set(Reachability::Reachable);
        assert!(oracle.is_reachable());
    }

    #[tokio::test]
    async fn subscribers_see_changes_only() {
        let oracle = WatchOracle::new(Reachability::Unknown);
        let mut rx = oracle.subscribe();

        oracle.set(Reachability::Unknown);
        assert!(!rx.has_changed().expect("sender alive"));

        oracle.set(Reachability::Reachable);
        rx.changed().await.expect("sender alive");
        assert_eq!(*rx.borrow_and_update(), Reachability::Reachable);
    }
}

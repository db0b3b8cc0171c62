//! Stock presentation surfaces.

use std::sync::{Mutex, PoisonError};

use notiq_core::{PresentError, Presenter, QueueItem};

/// Logs every presentation. Installed on the shared arbiter until the
/// application provides a real surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn present(&self, item: &QueueItem, modal: bool) -> Result<(), PresentError> {
        tracing::info!(
            item_id = item.id,
            kind = %item.kind(),
            modal,
            title = item.title().unwrap_or(""),
            text = item.signature(),
            "present"
        );
        Ok(())
    }
}

/// One call to [`RecordingPresenter::present`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presented {
    pub item: QueueItem,
    pub modal: bool,
}

/// Keeps every presented item in memory; optionally refuses some signatures.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    presented: Mutex<Vec<Presented>>,
    refuse: Mutex<Vec<String>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail presentation of items whose signature equals `signature`.
    pub fn refuse(&self, signature: impl Into<String>) {
        self.refuse
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(signature.into());
    }

    pub fn presented(&self) -> Vec<Presented> {
        self.presented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Signatures in presentation order.
    pub fn texts(&self) -> Vec<String> {
        self.presented()
            .into_iter()
            .map(|p| p.item.signature().to_owned())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.presented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Presenter for RecordingPresenter {
    fn present(&self, item: &QueueItem, modal: bool) -> Result<(), PresentError> {
        let refused = self
            .refuse
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|s| s == item.signature());
        if refused {
            return Err(PresentError::Rejected(item.signature().to_owned()));
        }
        self.presented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Presented {
                item: item.clone(),
                modal,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use notiq_core::{Message, Payload};

    fn msg(text: &str) -> QueueItem {
        QueueItem::new(1, Payload::Message(Message::new(text)), false, Utc::now())
    }

    #[test]
    fn records_in_order() {
        let p = RecordingPresenter::new();
        p.present(&msg("a"), false).expect("present a");
        p.present(&msg("b"), true).expect("present b");
        assert_eq!(p.texts(), vec!["a", "b"]);
        assert!(p.presented()[1].modal);
    }

    #[test]
    fn refused_signature_fails() {
        let p = RecordingPresenter::new();
        p.refuse("bad");
        assert!(matches!(
            p.present(&msg("bad"), false),
            Err(PresentError::Rejected(_))
        ));
        assert_eq!(p.count(), 0);
    }

    #[test]
    fn tracing_presenter_accepts_everything() {
        assert!(TracingPresenter.present(&msg("x"), true).is_ok());
    }
}

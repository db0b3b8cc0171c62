//! Signature filters.
//!
//! A [`FilterSet`] is a shared, ordered list of message signatures. Readers
//! work on a snapshot so a drain in progress never observes a partial
//! update; writers swap in a whole new list.

use std::sync::{Arc, PoisonError, RwLock};

use crate::types::QueueItem;

/// Shared handle to an ordered list of suppressed signatures.
///
/// Cloning the handle shares the underlying list.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    signatures: Arc<RwLock<Arc<[String]>>>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_signatures<I, S>(signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = Self::new();
        set.replace(signatures);
        set
    }

    /// Current signatures. The returned slice is unaffected by later writes.
    pub fn snapshot(&self) -> Arc<[String]> {
        let guard = self
            .signatures
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the whole list. Later duplicates are dropped, first occurrence wins.
    pub fn replace<I, S>(&self, signatures: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for sig in signatures {
            let sig = sig.into();
            if !list.contains(&sig) {
                list.push(sig);
            }
        }
        self.store(list);
    }

    /// Append a signature. Returns `false` if it was already present.
    pub fn insert(&self, signature: impl Into<String>) -> bool {
        let signature = signature.into();
        let mut guard = self
            .signatures
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.contains(&signature) {
            return false;
        }
        let mut list = guard.to_vec();
        list.push(signature);
        *guard = list.into();
        true
    }

    /// Remove a signature. Returns `false` if it was not present.
    pub fn remove(&self, signature: &str) -> bool {
        let mut guard = self
            .signatures
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !guard.iter().any(|s| s == signature) {
            return false;
        }
        let list: Vec<String> = guard.iter().filter(|s| *s != signature).cloned().collect();
        *guard = list.into();
        true
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn store(&self, list: Vec<String>) {
        let mut guard = self
            .signatures
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = list.into();
    }
}

/// Read-only suppression decision over one snapshot of a [`FilterSet`].
///
/// Take one per batch: every item in the batch is then judged against the
/// same list, whatever the owner does to the set meanwhile.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    signatures: Arc<[String]>,
}

impl ContentFilter {
    pub fn new(set: &FilterSet) -> Self {
        Self {
            signatures: set.snapshot(),
        }
    }

    /// Exact match of the item's signature against any configured signature.
    pub fn should_suppress(&self, item: &QueueItem) -> bool {
        let sig = item.signature();
        self.signatures.iter().any(|s| s == sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Alert, ErrorReport, Message, Payload};
    use chrono::Utc;

    fn msg(text: &str) -> QueueItem {
        QueueItem::new(1, Payload::Message(Message::new(text)), false, Utc::now())
    }

    #[test]
    fn empty_set_suppresses_nothing() {
        let filter = ContentFilter::new(&FilterSet::new());
        assert!(!filter.should_suppress(&msg("anything")));
    }

    #[test]
    fn exact_match_only() {
        let set = FilterSet::from_signatures(["Session expired"]);
        let filter = ContentFilter::new(&set);
        assert!(filter.should_suppress(&msg("Session expired")));
        assert!(!filter.should_suppress(&msg("Session expired.")));
        assert!(!filter.should_suppress(&msg("session expired")));
    }

    #[test]
    fn matches_error_description() {
        let set = FilterSet::from_signatures(["The request timed out."]);
        let filter = ContentFilter::new(&set);
        let err = QueueItem::new(
            2,
            Payload::Error(ErrorReport::network(-1001, "The request timed out.")),
            false,
            Utc::now(),
        );
        assert!(filter.should_suppress(&err));
    }

    #[test]
    fn replace_dedups_and_keeps_order() {
        let set = FilterSet::from_signatures(["b", "a", "b", "c"]);
        assert_eq!(&*set.snapshot(), &["b".to_string(), "a".into(), "c".into()]);
    }

    #[test]
    fn insert_and_remove() {
        let set = FilterSet::new();
        assert!(set.insert("x"));
        assert!(!set.insert("x"));
        assert_eq!(set.len(), 1);
        assert!(set.remove("x"));
        assert!(!set.remove("x"));
        assert!(set.is_empty());
    }

    #[test]
    fn clones_share_the_list() {
        let set = FilterSet::new();
        let other = set.clone();
        other.insert("shared");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn filter_keeps_its_snapshot_across_writes() {
        let set = FilterSet::from_signatures(["old"]);
        let filter = ContentFilter::new(&set);
        set.replace(["new"]);

        let alert = QueueItem::new(3, Payload::Alert(Alert::new("old")), true, Utc::now());
        assert!(filter.should_suppress(&alert));
        assert!(!ContentFilter::new(&set).should_suppress(&alert));
    }
}

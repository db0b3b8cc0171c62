use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Payloads ────────────────────────────────────────────────────

/// Plain informational message. Always presented non-modally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub title: Option<String>,
    pub text: String,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            title: None,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Alert request. The only payload for which the modal flag is honored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: Option<String>,
    pub text: String,
}

impl Alert {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            title: None,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Structured error report (domain + code + human-readable description).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub domain: String,
    pub code: i64,
    pub description: String,
}

impl ErrorReport {
    /// Domain marking an error as caused by missing connectivity.
    pub const NETWORK_DOMAIN: &'static str = "network";

    pub fn new(domain: impl Into<String>, code: i64, description: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            description: description.into(),
        }
    }

    pub fn network(code: i64, description: impl Into<String>) -> Self {
        Self::new(Self::NETWORK_DOMAIN, code, description)
    }

    pub fn is_network(&self) -> bool {
        self.domain.eq_ignore_ascii_case(Self::NETWORK_DOMAIN)
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.description, self.domain, self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Message(Message),
    Alert(Alert),
    Error(ErrorReport),
    ParseError(ErrorReport),
}

// ─── Item Kind ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Message,
    Alert,
    Error,
    ParseError,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Alert => "alert",
            Self::Error => "error",
            Self::ParseError => "parse_error",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Queue Item ──────────────────────────────────────────────────

/// One unit of work buffered by a queue.
///
/// Immutable once built. Owned by the queue until a commit drains it, then
/// moved into the arbiter, which either presents it, drops it, or keeps it
/// in its deferred set. It never goes back into a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: u64,
    pub payload: Payload,
    pub modal: bool,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueItem {
    /// Build an item. `modal` is discarded for every payload except [`Payload::Alert`].
    pub fn new(id: u64, payload: Payload, modal: bool, enqueued_at: DateTime<Utc>) -> Self {
        let modal = modal && matches!(payload, Payload::Alert(_));
        Self {
            id,
            payload,
            modal,
            enqueued_at,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self.payload {
            Payload::Message(_) => ItemKind::Message,
            Payload::Alert(_) => ItemKind::Alert,
            Payload::Error(_) => ItemKind::Error,
            Payload::ParseError(_) => ItemKind::ParseError,
        }
    }

    /// Text that filter signatures are compared against.
    pub fn signature(&self) -> &str {
        match &self.payload {
            Payload::Message(m) => &m.text,
            Payload::Alert(a) => &a.text,
            Payload::Error(e) | Payload::ParseError(e) => &e.description,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match &self.payload {
            Payload::Message(m) => m.title.as_deref(),
            Payload::Alert(a) => a.title.as_deref(),
            Payload::Error(e) | Payload::ParseError(e) => Some(e.domain.as_str()),
        }
    }

    /// An item with nothing to show.
    pub fn is_empty(&self) -> bool {
        self.signature().trim().is_empty()
    }

    /// Whether delivery must wait for network reachability.
    pub fn requires_connectivity(&self) -> bool {
        matches!(&self.payload, Payload::Error(e) if e.is_network())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(payload: Payload, modal: bool) -> QueueItem {
        QueueItem::new(1, payload, modal, Utc::now())
    }

    #[test]
    fn modal_only_kept_for_alerts() {
        assert!(item(Payload::Alert(Alert::new("a")), true).modal);
        assert!(!item(Payload::Message(Message::new("m")), true).modal);
        assert!(!item(Payload::Error(ErrorReport::new("io", 1, "x")), true).modal);
        assert!(!item(Payload::ParseError(ErrorReport::new("json", 2, "y")), true).modal);
    }

    #[test]
    fn signature_per_payload() {
        assert_eq!(item(Payload::Message(Message::new("hello")), false).signature(), "hello");
        assert_eq!(item(Payload::Alert(Alert::new("careful")), false).signature(), "careful");
        let err = ErrorReport::new("io", 5, "disk full");
        assert_eq!(item(Payload::Error(err), false).signature(), "disk full");
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert!(item(Payload::Message(Message::new("   ")), false).is_empty());
        assert!(item(Payload::Alert(Alert::new("")), false).is_empty());
        assert!(!item(Payload::Alert(Alert::new("x")), false).is_empty());
    }

    #[test]
    fn only_network_errors_need_connectivity() {
        let net = item(Payload::Error(ErrorReport::network(-1009, "offline")), false);
        assert!(net.requires_connectivity());

        let upper = item(Payload::Error(ErrorReport::new("NETWORK", 1, "x")), false);
        assert!(upper.requires_connectivity());

        let parse = item(Payload::ParseError(ErrorReport::network(1, "bad json")), false);
        assert!(!parse.requires_connectivity());

        let msg = item(Payload::Message(Message::new("hi")), false);
        assert!(!msg.requires_connectivity());
    }

    #[test]
    fn error_title_is_domain() {
        let it = item(Payload::Error(ErrorReport::new("storage", 3, "locked")), false);
        assert_eq!(it.title(), Some("storage"));
        assert_eq!(it.kind(), ItemKind::Error);
    }

    #[test]
    fn payload_serializes_tagged() {
        let json = serde_json::to_value(Payload::Message(Message::new("hi"))).expect("serialize");
        assert_eq!(json["kind"], "message");
        assert_eq!(json["data"]["text"], "hi");
    }
}

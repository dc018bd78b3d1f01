//! Core data types shared by the catalog, the session, and the renderers.
//!
//! Upstream payloads never reach these types directly; they go through the
//! tolerant parser in [`crate::catalog`] first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A selectable newspaper (or single article) used as chat context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Date exactly as the upstream sent it.
    pub raw_date: String,
    /// Human-readable date, e.g. `14th September 1847`, or `raw_date` when
    /// it does not parse.
    pub display_date: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Full text / markdown, present once the document has been enriched.
    #[serde(default)]
    pub content: Option<String>,
}

impl Document {
    /// True when there is something a resolver can ground a reply on.
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
            || !self.sections.is_empty()
            || self.summary.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// An article inside a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    #[default]
    Text,
    Error,
    LoadingPlaceholder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub kind: MessageKind,
}

impl Message {
    fn new(sender: Sender, content: String, kind: MessageKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            content,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content.into(), MessageKind::Text)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content.into(), MessageKind::Text)
    }

    /// Transient "assistant is composing" row. Never stored in a session log.
    pub fn placeholder() -> Self {
        Self::new(Sender::Assistant, String::new(), MessageKind::LoadingPlaceholder)
    }

    /// Display-only row carrying a session error.
    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content.into(), MessageKind::Error)
    }
}

/// One history entry as sent to a remote resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender: Sender,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(m: &Message) -> Self {
        Self {
            sender: m.sender,
            content: m.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_unique() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert_ne!(a.id, b.id);
        assert_eq!(a.sender, Sender::User);
        assert_eq!(a.kind, MessageKind::Text);
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        let entry = HistoryEntry {
            sender: Sender::Assistant,
            content: "ok".into(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["sender"], "assistant");
    }

    #[test]
    fn test_has_content() {
        let mut doc = Document {
            id: "1".into(),
            title: "T".into(),
            raw_date: String::new(),
            display_date: String::new(),
            source: None,
            summary: None,
            sections: vec![],
            content: None,
        };
        assert!(!doc.has_content());
        doc.content = Some("# Front page".into());
        assert!(doc.has_content());
    }
}

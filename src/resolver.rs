//! Response resolvers: turn a user message plus document context into an
//! assistant reply.
//!
//! - **[`RemoteResolver`]**: `POST {base}/api/chat` with
//!   `{documentId, message, history}`; expects `{response}` on success and
//!   `{detail}` with a non-2xx status on failure.
//! - **[`LocalResolver`]**: offline, deterministic replies built from the
//!   document's own sections. Same document and text always give the same
//!   answer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::error::SendFailure;
use crate::models::{Document, HistoryEntry, Message, Section};

/// Produces the assistant's reply for one user message.
#[async_trait]
pub trait ResponseResolver: Send + Sync {
    /// Short label for logs (`"remote"`, `"local"`).
    fn name(&self) -> &str;

    /// Resolve a reply.
    ///
    /// `history` is the message log as it was before `text` was appended.
    async fn resolve(
        &self,
        document: &Document,
        history: &[Message],
        text: &str,
    ) -> Result<String, SendFailure>;
}

// ============ Remote ============

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "documentId")]
    pub document_id: String,
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Success body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

pub struct RemoteResolver {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteResolver {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ResponseResolver for RemoteResolver {
    fn name(&self) -> &str {
        "remote"
    }

    async fn resolve(
        &self,
        document: &Document,
        history: &[Message],
        text: &str,
    ) -> Result<String, SendFailure> {
        let body = ChatRequest {
            document_id: document.id.clone(),
            message: text.to_string(),
            history: history.iter().map(HistoryEntry::from).collect(),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // The error body is optional and may not even be JSON.
            let detail = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string));
            return Err(SendFailure::status(status.as_u16(), detail));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| SendFailure::MalformedBody(e.to_string()))?;
        Ok(reply.response)
    }
}

// ============ Local ============

/// Minimum word length considered when matching a question to sections.
const MIN_KEYWORD_LEN: usize = 4;

const STOP_WORDS: &[&str] = &[
    "what", "about", "with", "this", "that", "from", "have", "there", "which", "does", "tell",
    "were", "when", "where", "paper", "newspaper", "article",
];

/// Offline resolver with canned, document-grounded replies.
#[derive(Debug, Default, Clone)]
pub struct LocalResolver;

impl LocalResolver {
    pub fn new() -> Self {
        Self
    }

    /// The reply for `text` about `document`. Pure.
    pub fn reply(&self, document: &Document, text: &str) -> String {
        let lowered = text.to_lowercase();
        if lowered.contains("summar") || lowered.contains("key points") {
            return summarize(document);
        }

        let matches = matching_sections(document, &lowered);
        if !matches.is_empty() {
            let mut out = format!("From {}:\n", document.title);
            for s in matches {
                out.push_str(&format!(
                    "\n- {}{}: {}",
                    s.title,
                    page_label(s),
                    first_sentence(&s.body)
                ));
            }
            return out;
        }

        format!(
            "AI response about \"{}\" to your question: \"{}\"",
            document.title, text
        )
    }
}

#[async_trait]
impl ResponseResolver for LocalResolver {
    fn name(&self) -> &str {
        "local"
    }

    async fn resolve(
        &self,
        document: &Document,
        _history: &[Message],
        text: &str,
    ) -> Result<String, SendFailure> {
        Ok(self.reply(document, text))
    }
}

fn page_label(section: &Section) -> String {
    section
        .page
        .map(|p| format!(" (page {})", p))
        .unwrap_or_default()
}

fn first_sentence(text: &str) -> &str {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(_, c)| c == '.')
        .map(|(i, _)| i + 1)
        .unwrap_or(text.len());
    let limit = text
        .char_indices()
        .nth(160)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end.min(limit)]
}

/// Key points grouped by section category, in order of first appearance.
fn summarize(document: &Document) -> String {
    let mut out = format!("Key points from {}", document.title);
    if !document.display_date.is_empty() {
        out.push_str(&format!(" ({})", document.display_date));
    }
    out.push(':');

    if document.sections.is_empty() {
        let fallback = document
            .summary
            .as_deref()
            .or(document.content.as_deref())
            .map(first_sentence)
            .unwrap_or("No article text is available for this newspaper.");
        out.push_str(&format!("\n\n{}", fallback));
        return out;
    }

    let mut groups: Vec<(&str, Vec<&Section>)> = Vec::new();
    for s in &document.sections {
        let category = s.category.as_deref().unwrap_or("General");
        match groups.iter_mut().find(|(c, _)| *c == category) {
            Some((_, list)) => list.push(s),
            None => groups.push((category, vec![s])),
        }
    }

    for (category, sections) in groups {
        out.push_str(&format!("\n\n**{}**", category));
        for s in sections {
            out.push_str(&format!("\n- {}: {}", s.title, first_sentence(&s.body)));
        }
    }
    out
}

fn keywords(lowered: &str) -> Vec<&str> {
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN && !STOP_WORDS.contains(w))
        .collect()
}

fn matching_sections<'a>(document: &'a Document, lowered: &str) -> Vec<&'a Section> {
    let words = keywords(lowered);
    if words.is_empty() {
        return Vec::new();
    }
    document
        .sections
        .iter()
        .filter(|s| {
            let haystack = format!("{} {}", s.title, s.body).to_lowercase();
            words.iter().any(|w| haystack.contains(w))
        })
        .collect()
}

/// Build the resolver selected by `resolver.kind`.
pub fn create_resolver(config: &Config) -> Result<Arc<dyn ResponseResolver>> {
    match config.resolver.kind.as_str() {
        "local" => Ok(Arc::new(LocalResolver::new())),
        "remote" => {
            let client = reqwest::Client::builder()
                .timeout(config.backend.timeout())
                .build()
                .context("Failed to build HTTP client")?;
            Ok(Arc::new(RemoteResolver::new(client, config.base_url())))
        }
        other => anyhow::bail!("Unknown resolver kind: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;

    fn star_of_chile() -> Document {
        StaticCatalog::builtin()
            .documents()
            .iter()
            .find(|d| d.id == "4")
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_summary_groups_by_category() {
        let reply = LocalResolver::new().reply(&star_of_chile(), "Summarize this paper");
        assert!(reply.starts_with("Key points from Star of Chile (14th September 1847):"));
        assert!(reply.contains("**Government**"));
        assert!(reply.contains("**Agriculture**"));
        assert!(reply.contains("New Consulate Building Opens in Santiago"));
    }

    #[test]
    fn test_keyword_filters_sections() {
        let reply = LocalResolver::new().reply(&star_of_chile(), "What about the harvest?");
        assert!(reply.contains("Agriculture Flourishes in Central Valley (page 3)"));
        assert!(!reply.contains("Consulate"));
    }

    #[test]
    fn test_generic_reply() {
        let reply = LocalResolver::new().reply(&star_of_chile(), "hi");
        assert_eq!(
            reply,
            "AI response about \"Star of Chile\" to your question: \"hi\""
        );
    }

    #[test]
    fn test_deterministic() {
        let doc = star_of_chile();
        let r = LocalResolver::new();
        assert_eq!(r.reply(&doc, "summary please"), r.reply(&doc, "summary please"));
    }

    #[test]
    fn test_summary_without_sections_uses_summary_text() {
        let mut doc = star_of_chile();
        doc.sections.clear();
        let reply = LocalResolver::new().reply(&doc, "summarize");
        assert!(reply.contains("News and information for the English-speaking community"));
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("One. Two."), "One.");
        assert_eq!(first_sentence("  no stop  "), "no stop");
    }

    #[test]
    fn test_request_wire_shape() {
        let req = ChatRequest {
            document_id: "4".into(),
            message: "hello".into(),
            history: vec![HistoryEntry::from(&Message::user("earlier"))],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["documentId"], "4");
        assert_eq!(json["message"], "hello");
        assert_eq!(json["history"][0]["sender"], "user");
        assert_eq!(json["history"][0]["content"], "earlier");
    }
}

//! Message renderer: turns a session snapshot into display rows.
//!
//! Stateless. The composing indicator is a transient placeholder row added
//! at render time; it is never part of the session log.

use crate::models::{Message, MessageKind, Sender};
use crate::session::SessionView;

pub const WELCOME_TITLE: &str = "Welcome to Historical AI";
pub const WELCOME_SUBTITLE: &str =
    "Select a newspaper from the archive to start analyzing history.";

/// Feature cards shown on the empty state.
pub const FEATURES: &[(&str, &str)] = &[
    ("Summarize", "Get concise summaries of long articles and reports."),
    ("Analyze", "Extract key themes, sentiment, and historical context."),
    ("Explore", "Ask about specific dates, people, or events in the text."),
];

/// The rows to display: the log, then the composing placeholder while a
/// reply is outstanding.
pub fn display_rows(messages: &[Message], composing: bool) -> Vec<Message> {
    let mut rows = messages.to_vec();
    if composing {
        rows.push(Message::placeholder());
    }
    rows
}

/// One row as a line of text.
pub fn render_row(message: &Message) -> String {
    match (message.kind, message.sender) {
        (MessageKind::LoadingPlaceholder, _) => "AI: ...".to_string(),
        (MessageKind::Error, _) => format!("! {}", message.content),
        (MessageKind::Text, Sender::User) => format!("You: {}", message.content),
        (MessageKind::Text, Sender::Assistant) => format!("AI: {}", message.content),
    }
}

pub fn render_empty_state() -> String {
    let mut out = format!("{}\n{}\n", WELCOME_TITLE, WELCOME_SUBTITLE);
    for (title, text) in FEATURES {
        out.push_str(&format!("\n  {:<10} {}", title, text));
    }
    out
}

/// Header line for the selected document.
pub fn render_header(view: &SessionView) -> String {
    match &view.document {
        Some(doc) if doc.display_date.is_empty() => doc.title.clone(),
        Some(doc) => format!("{} ({})", doc.title, doc.display_date),
        None => "Chat AC: Historical Analysis Assistant".to_string(),
    }
}

/// Full transcript of a snapshot, as plain text.
pub fn render_view(view: &SessionView) -> String {
    let mut out = render_header(view);
    out.push_str("\n\n");

    if view.messages.is_empty() && !view.awaiting {
        out.push_str(&render_empty_state());
    } else {
        let rows: Vec<String> = display_rows(&view.messages, view.awaiting)
            .iter()
            .map(render_row)
            .collect();
        out.push_str(&rows.join("\n"));
    }

    if let Some(error) = &view.error {
        out.push_str("\n\n");
        out.push_str(&render_row(&Message::error(format!(
            "{} (send again to retry)",
            error
        ))));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::error::SendFailure;
    use crate::session::ChatSession;

    fn session_with_doc() -> ChatSession {
        let mut s = ChatSession::new();
        let doc = StaticCatalog::builtin().documents()[3].clone();
        s.select_document(Some(doc));
        s
    }

    #[test]
    fn test_placeholder_only_while_composing() {
        let msgs = vec![Message::user("hi")];
        assert_eq!(display_rows(&msgs, false).len(), 1);
        let rows = display_rows(&msgs, true);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].kind, MessageKind::LoadingPlaceholder);
        assert_eq!(render_row(&rows[1]), "AI: ...");
    }

    #[test]
    fn test_empty_state() {
        let view = ChatSession::new().view();
        let text = render_view(&view);
        assert!(text.contains(WELCOME_TITLE));
        assert!(text.contains("Summarize"));
    }

    #[test]
    fn test_transcript_order_and_header() {
        let mut s = session_with_doc();
        let p = s.begin_send("Summarize").unwrap();
        s.complete_send(p, Ok("Key points: ...".into()));
        let text = render_view(&s.view());
        assert!(text.starts_with("Star of Chile (14th September 1847)"));
        let you = text.find("You: Summarize").unwrap();
        let ai = text.find("AI: Key points: ...").unwrap();
        assert!(you < ai);
    }

    #[test]
    fn test_error_banner() {
        let mut s = session_with_doc();
        let p = s.begin_send("hello").unwrap();
        s.complete_send(p, Err(SendFailure::status(503, None)));
        let text = render_view(&s.view());
        assert!(text.contains("You: hello"));
        assert!(text.contains("! AI Error: server error 503 (send again to retry)"));
    }
}

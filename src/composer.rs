//! Message composer: the uncommitted draft and its submission rules.

use crate::session::SessionView;

/// Key presses the composer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    /// Enter with the line-break modifier (Shift).
    ShiftEnter,
}

/// What the composer needs to know about the session to gate submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitGate {
    pub has_document: bool,
    pub awaiting: bool,
}

impl SubmitGate {
    pub fn from_view(view: &SessionView) -> Self {
        Self {
            has_document: view.document.is_some(),
            awaiting: view.awaiting,
        }
    }

    pub fn is_open(&self) -> bool {
        self.has_document && !self.awaiting
    }
}

#[derive(Debug, Default, Clone)]
pub struct MessageComposer {
    draft: String,
}

impl MessageComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn insert(&mut self, text: &str) {
        self.draft.push_str(text);
    }

    pub fn can_submit(&self, gate: SubmitGate) -> bool {
        gate.is_open() && !self.draft.trim().is_empty()
    }

    /// Emit the trimmed draft and clear it, or `None` if submission is gated.
    pub fn submit(&mut self, gate: SubmitGate) -> Option<String> {
        if !self.can_submit(gate) {
            return None;
        }
        let text = self.draft.trim().to_string();
        self.draft.clear();
        Some(text)
    }

    /// Enter submits; Shift+Enter inserts a line break.
    pub fn key(&mut self, key: Key, gate: SubmitGate) -> Option<String> {
        match key {
            Key::Enter => self.submit(gate),
            Key::ShiftEnter => {
                self.draft.push('\n');
                None
            }
        }
    }
}

pub fn placeholder(gate: SubmitGate) -> &'static str {
    if gate.has_document {
        "Ask me anything about the selected newspaper..."
    } else {
        "Select a newspaper first to start chatting..."
    }
}

pub fn footer_hint(gate: SubmitGate) -> &'static str {
    if gate.has_document {
        "Press Enter to send, Shift+Enter for new line"
    } else {
        "Please select a newspaper to start chatting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::error::SendFailure;
    use crate::session::ChatSession;

    const OPEN: SubmitGate = SubmitGate {
        has_document: true,
        awaiting: false,
    };

    #[test]
    fn test_submit_trims_and_clears() {
        let mut c = MessageComposer::new();
        c.set_draft("  Who ran the consulate?  ");
        assert_eq!(c.submit(OPEN).as_deref(), Some("Who ran the consulate?"));
        assert_eq!(c.draft(), "");
    }

    #[test]
    fn test_blank_draft_gated() {
        let mut c = MessageComposer::new();
        assert_eq!(c.submit(OPEN), None);
        c.set_draft(" \n\t ");
        assert_eq!(c.submit(OPEN), None);
        assert_eq!(c.draft(), " \n\t ");
    }

    #[test]
    fn test_gated_by_session() {
        let mut session = ChatSession::new();
        let mut c = MessageComposer::new();
        c.set_draft("hello");
        assert_eq!(c.submit(SubmitGate::from_view(&session.view())), None);

        session.select_document(StaticCatalog::builtin().documents().first().cloned());
        let pending = session.begin_send("first").unwrap();
        assert_eq!(c.submit(SubmitGate::from_view(&session.view())), None);
        assert_eq!(c.draft(), "hello");

        session.complete_send(pending, Err(SendFailure::Transport("down".into())));
        assert_eq!(
            c.submit(SubmitGate::from_view(&session.view())).as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn test_shift_enter_inserts_newline() {
        let mut c = MessageComposer::new();
        c.insert("line one");
        assert_eq!(c.key(Key::ShiftEnter, OPEN), None);
        c.insert("line two");
        assert_eq!(c.key(Key::Enter, OPEN).as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn test_placeholder_text() {
        let idle = SubmitGate::from_view(&ChatSession::new().view());
        assert_eq!(placeholder(idle), "Select a newspaper first to start chatting...");
        assert_eq!(placeholder(OPEN), "Ask me anything about the selected newspaper...");
        assert_eq!(footer_hint(OPEN), "Press Enter to send, Shift+Enter for new line");
    }
}

//! The chat session state machine.
//!
//! ```text
//!            select(doc)                 send(text)
//!   Idle ───────────────▶ Ready ─────────────────────▶ Awaiting
//!    ▲                     ▲  ▲                          │  │
//!    │ select(none)        │  └──────── reply ───────────┘  │
//!    │                     │                                │ failure
//!    └──── any state       └──── send(text) ◀──── Errored ◀─┘
//! ```
//!
//! A send is split in two halves so that a caller can release the session
//! while the resolver runs: [`ChatSession::begin_send`] appends the user
//! message and hands back a [`PendingSend`]; [`ChatSession::complete_send`]
//! applies the outcome. Every selection bumps a generation counter, and a
//! completion from an older generation is dropped instead of attaching a
//! stale reply to the new document.

use serde::Serialize;

use crate::catalog::CatalogSource;
use crate::error::{ChatError, SendFailure, SendRejection};
use crate::models::{Document, Message, Sender};
use crate::resolver::ResponseResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No document selected.
    Idle,
    /// Document selected, nothing in flight.
    Ready,
    /// One send in flight.
    Awaiting,
    /// Last operation failed; the log is kept.
    Errored,
}

/// An accepted send whose reply has not been applied yet.
#[derive(Debug, Clone)]
pub struct PendingSend {
    generation: u64,
    pub document: Document,
    /// Log as it was before the user message was appended.
    pub history: Vec<Message>,
    pub text: String,
}

impl PendingSend {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Replied,
    Failed,
    /// The selection changed while the reply was outstanding.
    Discarded,
}

/// Read-only snapshot for renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub document: Option<Document>,
    pub messages: Vec<Message>,
    pub awaiting: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct ChatSession {
    document: Option<Document>,
    messages: Vec<Message>,
    awaiting: bool,
    error: Option<String>,
    generation: u64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        if self.awaiting {
            SessionState::Awaiting
        } else if self.error.is_some() {
            SessionState::Errored
        } else if self.document.is_some() {
            SessionState::Ready
        } else {
            SessionState::Idle
        }
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a send would currently be accepted (text aside).
    pub fn can_send(&self) -> bool {
        self.document.is_some() && !self.awaiting
    }

    /// Commit a selection. The log and the error are cleared whatever the
    /// previous state was, and any outstanding reply becomes stale.
    pub fn select_document(&mut self, document: Option<Document>) {
        self.generation += 1;
        match &document {
            Some(doc) => tracing::info!(id = %doc.id, title = %doc.title, "document selected"),
            None => tracing::info!("selection cleared"),
        }
        self.document = document;
        self.messages.clear();
        self.error = None;
        self.awaiting = false;
    }

    /// Record a failed enrichment. The previous selection and its log stay
    /// as they were.
    pub fn fail_selection(&mut self, error: &ChatError) {
        tracing::warn!(error = %error, "selection rolled back");
        self.error = Some(error.to_string());
    }

    /// Enrich `summary` through `catalog`, then commit it. Passing `None`
    /// clears the selection.
    pub async fn select(
        &mut self,
        catalog: &dyn CatalogSource,
        summary: Option<&Document>,
    ) -> Result<(), ChatError> {
        let Some(summary) = summary else {
            self.select_document(None);
            return Ok(());
        };
        let result = catalog.details(summary).await;
        self.finish_selection(result)
    }

    /// Commit the outcome of an enrichment. A document with nothing a
    /// resolver could ground a reply on is refused like a failed fetch, so
    /// the previous selection stays.
    pub fn finish_selection(
        &mut self,
        result: Result<Document, ChatError>,
    ) -> Result<(), ChatError> {
        let checked = result.and_then(|doc| {
            if doc.has_content() {
                Ok(doc)
            } else {
                Err(ChatError::DocumentEnrichment {
                    id: doc.id,
                    reason: "no content".to_string(),
                })
            }
        });
        match checked {
            Ok(doc) => {
                self.select_document(Some(doc));
                Ok(())
            }
            Err(e) => {
                self.fail_selection(&e);
                Err(e)
            }
        }
    }

    /// Accept a send: append the user message and enter `Awaiting`.
    pub fn begin_send(&mut self, text: &str) -> Result<PendingSend, SendRejection> {
        if self.awaiting {
            return Err(SendRejection::AlreadyAwaiting);
        }
        let Some(document) = self.document.clone() else {
            return Err(SendRejection::NoDocument);
        };
        if text.trim().is_empty() {
            return Err(SendRejection::EmptyMessage);
        }

        let history = self.messages.clone();
        self.messages.push(Message::user(text));
        self.awaiting = true;
        self.error = None;
        tracing::debug!(document = %document.id, history = history.len(), "send started");

        Ok(PendingSend {
            generation: self.generation,
            document,
            history,
            text: text.to_string(),
        })
    }

    /// Apply the resolver's outcome for `pending`.
    pub fn complete_send(
        &mut self,
        pending: PendingSend,
        result: Result<String, SendFailure>,
    ) -> SendOutcome {
        if pending.generation != self.generation {
            tracing::info!(
                document = %pending.document.id,
                "discarding reply for a document that is no longer selected"
            );
            return SendOutcome::Discarded;
        }

        self.awaiting = false;
        match result {
            Ok(reply) => {
                // An enrichment may have failed while the reply was out.
                self.error = None;
                self.messages.push(Message::assistant(reply));
                tracing::debug!(document = %pending.document.id, "reply received");
                SendOutcome::Replied
            }
            Err(failure) => {
                let error = ChatError::Send(failure);
                tracing::warn!(document = %pending.document.id, error = %error, "send failed");
                self.error = Some(error.to_string());
                SendOutcome::Failed
            }
        }
    }

    /// Send `text` and wait for the reply in one go.
    pub async fn send_message(
        &mut self,
        resolver: &dyn ResponseResolver,
        text: &str,
    ) -> Result<SendOutcome, SendRejection> {
        let pending = self.begin_send(text)?;
        let result = resolver
            .resolve(&pending.document, &pending.history, &pending.text)
            .await;
        Ok(self.complete_send(pending, result))
    }

    /// Number of user messages that have no assistant reply after them.
    pub fn unanswered(&self) -> usize {
        self.messages
            .iter()
            .rev()
            .take_while(|m| m.sender == Sender::User)
            .count()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.state(),
            document: self.document.clone(),
            messages: self.messages.clone(),
            awaiting: self.awaiting,
            error: self.error.clone(),
        }
    }
}

//! Error taxonomy for the chat core.
//!
//! Every failure here is recoverable by the user: a catalog load can be
//! retried, a failed enrichment leaves the previous selection in place, and a
//! failed send leaves the session `Errored` with the user's message kept.

use std::time::Duration;

/// Why a `send_message` call was refused before any request was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendRejection {
    #[error("no newspaper selected")]
    NoDocument,
    #[error("message is empty")]
    EmptyMessage,
    #[error("a reply is already pending")]
    AlreadyAwaiting,
}

/// How a send failed once the request was under way.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendFailure {
    #[error("{0}")]
    Transport(String),
    /// Non-2xx answer. `detail` is the backend's `detail` field, or
    /// `"server error <status>"` when the body carried none.
    #[error("{detail}")]
    Status { status: u16, detail: String },
    #[error("malformed response: {0}")]
    MalformedBody(String),
    #[error("no reply within {}", human_duration(.0))]
    Timeout(Duration),
}

fn human_duration(d: &Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

impl SendFailure {
    /// Build a `Status` failure, falling back to the generic message when the
    /// backend sent no usable detail.
    pub fn status(status: u16, detail: Option<String>) -> Self {
        let detail = detail
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("server error {}", status));
        SendFailure::Status { status, detail }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("Could not load list: {0}")]
    CatalogLoad(String),
    #[error("Failed to load document {id}: {reason}")]
    DocumentEnrichment { id: String, reason: String },
    #[error("AI Error: {0}")]
    Send(SendFailure),
    #[error("{0}")]
    Rejected(SendRejection),
}

impl From<SendFailure> for ChatError {
    fn from(f: SendFailure) -> Self {
        ChatError::Send(f)
    }
}

impl From<SendRejection> for ChatError {
    fn from(r: SendRejection) -> Self {
        ChatError::Rejected(r)
    }
}

impl From<reqwest::Error> for SendFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SendFailure::MalformedBody(e.to_string())
        } else {
            SendFailure::Transport(e.to_string())
        }
    }
}

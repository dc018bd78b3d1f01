//! Document selector: a dropdown over the catalog.
//!
//! The selector never fetches and never touches the session. It turns user
//! actions into at most one [`SelectorEvent`], and [`render`] turns catalog
//! state into rows for display.

use serde::Serialize;

use crate::catalog::CatalogStatus;
use crate::models::Document;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorEvent {
    Select(String),
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropdownState {
    #[default]
    Closed,
    Open,
}

/// Open/closed state of the dropdown. Only item and clear clicks on an open
/// dropdown emit events.
#[derive(Debug, Default)]
pub struct DocumentSelector {
    state: DropdownState,
}

impl DocumentSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DropdownState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == DropdownState::Open
    }

    /// Toggle the trigger. Ignored while `disabled` (catalog loading).
    pub fn activate(&mut self, disabled: bool) {
        if disabled {
            return;
        }
        self.state = match self.state {
            DropdownState::Closed => DropdownState::Open,
            DropdownState::Open => DropdownState::Closed,
        };
    }

    pub fn click_item(&mut self, id: &str) -> Option<SelectorEvent> {
        if !self.is_open() {
            return None;
        }
        self.state = DropdownState::Closed;
        if id.is_empty() {
            tracing::warn!("selection without an id ignored");
            return None;
        }
        Some(SelectorEvent::Select(id.to_string()))
    }

    pub fn click_clear(&mut self) -> Option<SelectorEvent> {
        if !self.is_open() {
            return None;
        }
        self.state = DropdownState::Closed;
        Some(SelectorEvent::Clear)
    }

    pub fn click_outside(&mut self) {
        self.state = DropdownState::Closed;
    }
}

/// One row of the dropdown list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectorItem {
    pub id: String,
    pub title: String,
    pub date: String,
    pub source: Option<String>,
    pub article_count: usize,
    pub summary: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectorView {
    /// Trigger label: the selected title, or a placeholder.
    pub label: String,
    pub disabled: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub items: Vec<SelectorItem>,
}

pub const PLACEHOLDER: &str = "Choose a newspaper to analyze...";

/// Render the selector for the given catalog state and selection.
pub fn render(status: &CatalogStatus, selected: Option<&str>) -> SelectorView {
    let docs: &[Document] = match status {
        CatalogStatus::Ready(docs) => docs,
        _ => &[],
    };

    let items: Vec<SelectorItem> = docs
        .iter()
        .map(|d| SelectorItem {
            id: d.id.clone(),
            title: d.title.clone(),
            date: d.display_date.clone(),
            source: d.source.clone(),
            article_count: d.sections.len(),
            summary: d.summary.clone(),
            selected: selected == Some(d.id.as_str()),
        })
        .collect();

    let label = items
        .iter()
        .find(|i| i.selected)
        .map(|i| i.title.clone())
        .unwrap_or_else(|| PLACEHOLDER.to_string());

    let loading = matches!(status, CatalogStatus::Loading);
    SelectorView {
        label,
        disabled: loading,
        loading,
        error: match status {
            CatalogStatus::Failed(msg) => Some(msg.clone()),
            _ => None,
        },
        items,
    }
}

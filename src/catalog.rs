//! Document catalog: where the selectable newspapers come from.
//!
//! Upstream payloads are loosely shaped (different drafts of the backend use
//! `name`, `newspaper_name` or `title` for the same thing), so every JSON
//! object goes through [`parse_document`] before anything else sees it.
//!
//! Two [`CatalogSource`] implementations exist:
//! - **[`StaticCatalog`]**: an in-memory list, either the built-in archive or
//!   a JSON file.
//! - **[`RemoteCatalog`]**: `GET {base}/api/newspapers` for the list and
//!   `GET {base}/api/newspaper/{id}` for enrichment.
//!
//! [`DocumentCatalog`] wraps a source and tracks the tri-state load status.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::archive;
use crate::config::Config;
use crate::dates::display_date;
use crate::error::ChatError;
use crate::models::{Document, Section};

/// Title used when none of the known title fields is present.
pub const UNTITLED: &str = "Untitled";

const TITLE_FIELDS: &[&str] = &["name", "newspaper_name", "title"];

// ============ Tolerant parsing ============

fn str_field<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Strings and numbers both count as identifiers.
fn id_field(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_str(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| str_field(obj, k))
        .map(str::to_string)
}

fn raw_date(obj: &Value) -> Option<String> {
    match obj.get("date")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn page_field(obj: &Value) -> Option<u32> {
    match obj.get("page")? {
        Value::Number(n) => n.as_u64().and_then(|p| u32::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_section(value: &Value, fallback_id: String) -> Option<Section> {
    if !value.is_object() {
        return None;
    }
    let body = first_str(value, &["content", "body", "text"])?;
    Some(Section {
        id: id_field(value, "id").unwrap_or(fallback_id),
        title: first_str(value, &["title", "headline"]).unwrap_or_else(|| UNTITLED.to_string()),
        body,
        author: first_str(value, &["author"]),
        category: first_str(value, &["section", "category"]),
        page: page_field(value),
    })
}

fn parse_sections(parent_id: &str, values: &[Value]) -> Vec<Section> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| parse_section(v, format!("{}-{}", parent_id, i + 1)))
        .collect()
}

/// The `full_json_data` block some backends attach to detail responses.
fn full_data(obj: &Value) -> Option<&Value> {
    obj.get("full_json_data").filter(|v| v.is_object())
}

/// Normalize one upstream JSON object into a [`Document`].
///
/// Never fails on missing fields: the title falls back through
/// `name` → `newspaper_name` → `title` → `"Untitled"`, and an unparseable
/// date is displayed verbatim. Returns `None` only for non-objects. A missing
/// id yields an empty `id`; callers decide whether such an entry is usable.
pub fn parse_document(value: &Value) -> Option<Document> {
    if !value.is_object() {
        return None;
    }

    let id = id_field(value, "id").unwrap_or_default();
    let raw_date = raw_date(value).unwrap_or_default();
    let full = full_data(value);

    let mut sections = value
        .get("articles")
        .or_else(|| value.get("sections"))
        .and_then(Value::as_array)
        .map(|arr| parse_sections(&id, arr))
        .unwrap_or_default();
    if sections.is_empty() {
        if let Some(arr) = full.and_then(|f| f.get("Content")).and_then(Value::as_array) {
            sections = parse_sections(&id, arr);
        }
    }

    let content = first_str(value, &["markdown", "content"]).or_else(|| {
        full.and_then(|f| str_field(f, "Markdown"))
            .map(str::to_string)
    });

    Some(Document {
        title: first_str(value, TITLE_FIELDS).unwrap_or_else(|| UNTITLED.to_string()),
        display_date: display_date(&raw_date),
        raw_date,
        source: first_str(value, &["source", "origin"]),
        summary: first_str(value, &["summary", "description"]),
        sections,
        content,
        id,
    })
}

/// Normalize a listing payload. Entries that are not objects or carry no id
/// are dropped, as are repeated ids.
pub fn parse_listing(value: &Value) -> Result<Vec<Document>, ChatError> {
    let items = value
        .as_array()
        .ok_or_else(|| ChatError::CatalogLoad("expected a JSON array of newspapers".to_string()))?;

    let mut seen = HashSet::new();
    let mut docs = Vec::with_capacity(items.len());
    for item in items {
        let Some(doc) = parse_document(item) else {
            tracing::warn!("skipping non-object catalog entry");
            continue;
        };
        if doc.id.is_empty() {
            tracing::warn!(title = %doc.title, "skipping catalog entry without id");
            continue;
        }
        if !seen.insert(doc.id.clone()) {
            tracing::warn!(id = %doc.id, "skipping duplicate catalog id");
            continue;
        }
        docs.push(doc);
    }
    Ok(docs)
}

/// Merge a detail payload over the summary it was requested for.
///
/// The summary's id always wins: detail endpoints are not trusted to echo it.
/// The title prefers the detail's `name`/`newspaper_name` (or the metadata
/// name inside `full_json_data`), then the summary title.
pub fn merge_details(summary: &Document, detail: &Value) -> Result<Document, ChatError> {
    if !detail.is_object() {
        return Err(ChatError::DocumentEnrichment {
            id: summary.id.clone(),
            reason: "detail response is not a JSON object".to_string(),
        });
    }
    let mut pinned = detail.clone();
    pinned["id"] = Value::String(summary.id.clone());
    let parsed = parse_document(&pinned).ok_or_else(|| ChatError::DocumentEnrichment {
        id: summary.id.clone(),
        reason: "detail response is not a JSON object".to_string(),
    })?;

    let title = first_str(detail, &["name", "newspaper_name"])
        .or_else(|| {
            full_data(detail)
                .and_then(|f| f.get("metadata"))
                .and_then(|m| str_field(m, "newspaper_name"))
                .map(str::to_string)
        })
        .unwrap_or_else(|| summary.title.clone());

    let (raw_date, display) = if parsed.raw_date.trim().is_empty() {
        (summary.raw_date.clone(), summary.display_date.clone())
    } else {
        (parsed.raw_date.clone(), parsed.display_date.clone())
    };

    let sections = if parsed.sections.is_empty() {
        summary.sections.clone()
    } else {
        parsed.sections
    };

    let merged = Document {
        id: summary.id.clone(),
        title,
        raw_date,
        display_date: display,
        source: parsed.source.or_else(|| summary.source.clone()),
        summary: parsed.summary.or_else(|| summary.summary.clone()),
        sections,
        content: parsed.content.or_else(|| summary.content.clone()),
    };
    if !merged.has_content() {
        return Err(ChatError::DocumentEnrichment {
            id: merged.id,
            reason: "no content".to_string(),
        });
    }
    Ok(merged)
}

// ============ Sources ============

/// Where catalog data comes from.
///
/// Implementations are swapped at composition time: the static source for
/// tests and offline use, the remote one for a real backend.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Short label for logs (`"static"`, `"remote"`).
    fn name(&self) -> &str;

    /// Fetch the ordered list of document summaries from scratch.
    async fn list(&self) -> Result<Vec<Document>, ChatError>;

    /// Fetch the full document for a summary chosen from [`list`](Self::list).
    async fn details(&self, summary: &Document) -> Result<Document, ChatError>;
}

/// In-memory catalog. Documents are already complete, so enrichment is a
/// lookup.
pub struct StaticCatalog {
    documents: Vec<Document>,
}

impl StaticCatalog {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// The built-in archive of four Chilean English-language newspapers.
    pub fn builtin() -> Self {
        let docs = parse_listing(&archive::builtin_archive())
            .unwrap_or_default();
        Self::new(docs)
    }

    /// Load a JSON array of documents from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;
        let docs = parse_listing(&value)?;
        Ok(Self::new(docs))
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    fn name(&self) -> &str {
        "static"
    }

    async fn list(&self) -> Result<Vec<Document>, ChatError> {
        Ok(self.documents.clone())
    }

    async fn details(&self, summary: &Document) -> Result<Document, ChatError> {
        self.documents
            .iter()
            .find(|d| d.id == summary.id)
            .cloned()
            .ok_or_else(|| ChatError::DocumentEnrichment {
                id: summary.id.clone(),
                reason: "not found".to_string(),
            })
    }
}

/// Catalog backed by the HTTP backend.
pub struct RemoteCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteCatalog {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CatalogSource for RemoteCatalog {
    fn name(&self) -> &str {
        "remote"
    }

    async fn list(&self) -> Result<Vec<Document>, ChatError> {
        let url = format!("{}/api/newspapers", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChatError::CatalogLoad(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::CatalogLoad(format!(
                "Server error: {}",
                status.as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ChatError::CatalogLoad(format!("invalid JSON: {}", e)))?;
        parse_listing(&body)
    }

    async fn details(&self, summary: &Document) -> Result<Document, ChatError> {
        let enrichment_error = |reason: String| ChatError::DocumentEnrichment {
            id: summary.id.clone(),
            reason,
        };

        let url = format!("{}/api/newspaper/{}", self.base_url, summary.id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| enrichment_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(enrichment_error(format!(
                "Failed to load document details (status {})",
                status.as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| enrichment_error(format!("invalid JSON: {}", e)))?;
        merge_details(summary, &body)
    }
}

/// Build the catalog source selected by `catalog.source`.
pub fn create_catalog(config: &Config) -> Result<Arc<dyn CatalogSource>> {
    match config.catalog.source.as_str() {
        "static" => match &config.catalog.path {
            Some(path) => Ok(Arc::new(StaticCatalog::from_file(path)?)),
            None => Ok(Arc::new(StaticCatalog::builtin())),
        },
        "remote" => {
            let client = reqwest::Client::builder()
                .timeout(config.backend.timeout())
                .build()
                .context("Failed to build HTTP client")?;
            Ok(Arc::new(RemoteCatalog::new(client, config.base_url())))
        }
        other => anyhow::bail!("Unknown catalog source: {}", other),
    }
}

// ============ Status tracking ============

/// Load status of the catalog as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogStatus {
    Loading,
    Ready(Vec<Document>),
    Failed(String),
}

/// A catalog source plus its current status.
///
/// Loading always starts from scratch: a second successful [`load`] replaces
/// the list rather than appending to it.
///
/// [`load`]: DocumentCatalog::load
pub struct DocumentCatalog {
    source: Arc<dyn CatalogSource>,
    status: CatalogStatus,
}

impl DocumentCatalog {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            status: CatalogStatus::Loading,
        }
    }

    pub fn source(&self) -> Arc<dyn CatalogSource> {
        self.source.clone()
    }

    pub fn status(&self) -> &CatalogStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, CatalogStatus::Loading)
    }

    /// Documents of a ready catalog; empty while loading or after failure.
    pub fn documents(&self) -> &[Document] {
        match &self.status {
            CatalogStatus::Ready(docs) => docs,
            _ => &[],
        }
    }

    pub fn find(&self, id: &str) -> Option<&Document> {
        self.documents().iter().find(|d| d.id == id)
    }

    /// Mark the catalog as loading ahead of a fetch run elsewhere.
    pub fn begin_load(&mut self) {
        self.status = CatalogStatus::Loading;
    }

    /// Record the outcome of a fetch.
    pub fn finish_load(&mut self, result: Result<Vec<Document>, ChatError>) {
        self.status = match result {
            Ok(docs) => {
                tracing::info!(source = self.source.name(), count = docs.len(), "catalog loaded");
                CatalogStatus::Ready(docs)
            }
            Err(e) => {
                tracing::warn!(source = self.source.name(), error = %e, "catalog load failed");
                CatalogStatus::Failed(e.to_string())
            }
        };
    }

    /// Fetch the list from scratch and update the status.
    pub async fn load(&mut self) -> Result<Vec<Document>, ChatError> {
        self.begin_load();
        let result = self.source.list().await;
        self.finish_load(result.clone());
        result
    }
}

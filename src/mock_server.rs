//! Local HTTP backend serving the archive.
//!
//! Speaks the same three endpoints a real backend does, answering chats with
//! the [`LocalResolver`]. Handy for offline demos and for exercising the
//! remote catalog and resolver end to end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/newspapers` | List newspaper summaries |
//! | `GET`  | `/api/newspaper/{id}` | Full details (deliberately without `id`) |
//! | `POST` | `/api/chat` | `{documentId, message, history}` → `{response}` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Errors use the `{ "detail": "..." }` body with a non-2xx status.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::catalog::StaticCatalog;
use crate::config::Config;
use crate::models::Document;
use crate::resolver::{ChatReply, ChatRequest, LocalResolver};

#[derive(Clone)]
struct AppState {
    catalog: Arc<StaticCatalog>,
    resolver: LocalResolver,
}

/// Build the router over `catalog`.
pub fn router(catalog: Arc<StaticCatalog>) -> Router {
    let state = AppState {
        catalog,
        resolver: LocalResolver::new(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/newspapers", get(handle_list))
        .route("/api/newspaper/{id}", get(handle_details))
        .route("/api/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve on an already-bound listener until the process ends.
pub async fn serve(
    listener: tokio::net::TcpListener,
    catalog: Arc<StaticCatalog>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(catalog)).await?;
    Ok(())
}

/// Bind to `[server].bind` and serve the configured static catalog.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let catalog = match &config.catalog.path {
        Some(path) => StaticCatalog::from_file(path)?,
        None => StaticCatalog::builtin(),
    };
    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!(
        addr = %bind_addr,
        documents = catalog.documents().len(),
        "mock backend listening"
    );
    println!("Mock backend listening on http://{}", bind_addr);

    serve(listener, Arc::new(catalog)).await
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

struct ApiError {
    status: StatusCode,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

fn bad_request(detail: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        detail: detail.into(),
    }
}

fn not_found(detail: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        detail: detail.into(),
    }
}

// ============ Payloads ============

/// Listing entry. Uses `name` rather than `title`, as the real backend does.
fn summary_json(doc: &Document) -> Value {
    json!({
        "id": doc.id,
        "name": doc.title,
        "date": doc.raw_date,
        "source": doc.source,
        "summary": doc.summary,
        "articles": doc.sections.iter().map(|s| json!({
            "id": s.id,
            "title": s.title,
            "content": s.body,
            "author": s.author,
            "section": s.category,
            "page": s.page,
        })).collect::<Vec<_>>(),
    })
}

fn markdown(doc: &Document) -> String {
    let mut md = format!("# {}\n", doc.title);
    let byline: Vec<&str> = [Some(doc.display_date.as_str()), doc.source.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
    if !byline.is_empty() {
        md.push_str(&format!("\n*{}*\n", byline.join(", ")));
    }
    for s in &doc.sections {
        md.push_str(&format!("\n## {}\n\n{}\n", s.title, s.body));
        if let Some(author) = &s.author {
            md.push_str(&format!("\n_{}_\n", author));
        }
    }
    md
}

/// Detail payload. The id is left out on purpose: clients must keep their own.
fn details_json(doc: &Document) -> Value {
    json!({
        "newspaper_name": doc.title,
        "date": doc.raw_date,
        "source": doc.source,
        "summary": doc.summary,
        "full_json_data": {
            "Markdown": markdown(doc),
            "Content": doc.sections.iter().map(|s| json!({
                "id": s.id,
                "title": s.title,
                "content": s.body,
                "author": s.author,
                "section": s.category,
                "page": s.page,
            })).collect::<Vec<_>>(),
            "metadata": { "newspaper_name": doc.title },
        },
    })
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_list(State(state): State<AppState>) -> Json<Vec<Value>> {
    Json(state.catalog.documents().iter().map(summary_json).collect())
}

async fn handle_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let doc = state
        .catalog
        .documents()
        .iter()
        .find(|d| d.id == id)
        .ok_or_else(|| not_found("Newspaper not found"))?;
    Ok(Json(details_json(doc)))
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let doc = state
        .catalog
        .documents()
        .iter()
        .find(|d| d.id == req.document_id)
        .ok_or_else(|| not_found(format!("Newspaper {} not found", req.document_id)))?;

    tracing::debug!(document = %doc.id, history = req.history.len(), "chat request");
    Ok(Json(ChatReply {
        response: state.resolver.reply(doc, &req.message),
    }))
}

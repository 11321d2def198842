//! HTTP front end for the knowledge base.
//!
//! Uploaded documents are kept in memory until the next `POST /build`,
//! which ingests them together with the configured asset directory, if
//! there is one. Nothing is persisted across restarts.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Version, readiness and sizes |
//! | `GET`  | `/documents` | Uploaded documents |
//! | `PUT`  | `/documents/{filename}` | Upload raw bytes under `filename` |
//! | `POST` | `/build` | Rebuild the index from uploads and assets |
//! | `POST` | `/query` | `{ "query": "...", "k": 5 }` → ranked chunk metadata |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "knowledge base is not ready: build it before querying" } }
//! ```
//!
//! Malformed or non-JSON request bodies are `bad_request`.
//!
//! Error codes: `bad_request` (400), `not_ready` (409),
//! `invalid_index_input` (422), `internal` (500).
//!
//! Embedding and indexing are CPU-bound and run on the blocking pool.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::assets::scan_assets;
use crate::config::Config;
use crate::embedding::EmbedError;
use crate::knowledge::{BuildOutcome, KbError, KnowledgeBase, SkippedDocument};
use docbase_core::models::{ChunkMetadata, Document, DocumentFormat};

const NO_DATA_MESSAGE: &str = "No valid documents or chunks found to build the knowledge base.";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    kb: Arc<KnowledgeBase>,
    uploads: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl AppState {
    pub fn new(config: Config, kb: Arc<KnowledgeBase>) -> Self {
        Self {
            config: Arc::new(config),
            kb,
            uploads: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

/// The application router with CORS and the upload size limit applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", get(handle_list_documents))
        .route("/documents/{filename}", put(handle_upload))
        .route("/build", post(handle_build))
        .route("/query", post(handle_query))
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, kb: Arc<KnowledgeBase>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(config.clone(), kb));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    let message = message.into();
    error!(%message, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message,
    }
}

impl From<KbError> for AppError {
    fn from(err: KbError) -> Self {
        match err {
            KbError::NotReady => AppError {
                status: StatusCode::CONFLICT,
                code: "not_ready",
                message: err.to_string(),
            },
            KbError::Index(_)
            | KbError::Embed(EmbedError::CountMismatch { .. })
            | KbError::Embed(EmbedError::DimensionMismatch { .. }) => AppError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                code: "invalid_index_input",
                message: err.to_string(),
            },
            other => internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        internal(format!("worker task failed: {}", err))
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    ready: bool,
    kb_chunks: usize,
    documents: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let documents = state.uploads.read().await.len();
    let stats = state.kb.stats();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ready: stats.ready,
        kb_chunks: stats.chunks,
        documents,
    })
}

#[derive(Serialize)]
struct DocumentInfo {
    name: String,
    size: usize,
    format: DocumentFormat,
}

impl DocumentInfo {
    fn new(name: &str, size: usize) -> Self {
        Self {
            name: name.to_string(),
            size,
            format: DocumentFormat::from_filename(name),
        }
    }
}

#[derive(Serialize)]
struct DocumentList {
    documents: Vec<DocumentInfo>,
}

async fn handle_list_documents(State(state): State<AppState>) -> Json<DocumentList> {
    let uploads = state.uploads.read().await;
    Json(DocumentList {
        documents: uploads
            .iter()
            .map(|(name, bytes)| DocumentInfo::new(name, bytes.len()))
            .collect(),
    })
}

async fn handle_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<DocumentInfo>), AppError> {
    let name = filename.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(bad_request(format!("invalid filename: {:?}", filename)));
    }

    let info = DocumentInfo::new(name, body.len());
    let replaced = state
        .uploads
        .write()
        .await
        .insert(name.to_string(), body.to_vec())
        .is_some();
    info!(file = name, bytes = info.size, replaced, "document uploaded");

    let status = if replaced {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(info)))
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum BuildResponse {
    Ok {
        ingested_chunks: usize,
        documents: usize,
        skipped: Vec<SkippedDocument>,
    },
    NoData {
        message: &'static str,
        skipped: Vec<SkippedDocument>,
    },
}

async fn handle_build(State(state): State<AppState>) -> Result<Json<BuildResponse>, AppError> {
    let mut documents: Vec<Document> = state
        .uploads
        .read()
        .await
        .iter()
        .map(|(name, bytes)| Document::new(name.clone(), bytes.clone()))
        .collect();

    let config = state.config.clone();
    let kb = state.kb.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        if config.assets.root.is_some() {
            let assets = scan_assets(&config.assets).map_err(|e| internal(e.to_string()))?;
            documents.extend(assets);
        }
        kb.build(&documents).map_err(AppError::from)
    })
    .await??;

    Ok(Json(match outcome {
        BuildOutcome::Ingested(report) => BuildResponse::Ok {
            ingested_chunks: report.chunks_ingested,
            documents: report.documents_ingested,
            skipped: report.skipped,
        },
        BuildOutcome::NoData { skipped } => BuildResponse::NoData {
            message: NO_DATA_MESSAGE,
            skipped,
        },
    }))
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct QueryResponse {
    results: Vec<ChunkMetadata>,
}

async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(req) = body?;
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let k = req.k.unwrap_or(state.config.retrieval.default_k);

    let kb = state.kb.clone();
    let results = tokio::task::spawn_blocking(move || kb.query(&req.query, k)).await??;
    Ok(Json(QueryResponse { results }))
}

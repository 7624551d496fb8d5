use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sift_core::persist::{load_docs, load_index, save_docs, save_index, IndexPaths, MetaFile};
use sift_core::{DocId, DocMeta, InvertedIndex, QueryEvaluator, QueryParser, Tokenizer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_LIMIT: usize = 10_000;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub implicit_and: bool,
}
fn default_limit() -> usize { 100 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    /// Every matching id, ascending.
    pub doc_ids: Vec<DocId>,
    /// Paths for the first `limit` matches.
    pub docs: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub path: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: message.into(), position: None }))
}

#[derive(Deserialize)]
pub struct BatchDoc {
    pub doc_id: DocId,
    pub text: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Settings that do not come from the index directory itself.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub index_dir: PathBuf,
    /// Required in `X-ADMIN-TOKEN` for the `/index/*` endpoints; those are
    /// disabled when unset.
    pub admin_token: Option<String>,
}

impl ServerConfig {
    pub fn from_env(index_dir: impl Into<PathBuf>) -> Self {
        Self { index_dir: index_dir.into(), admin_token: std::env::var("ADMIN_TOKEN").ok() }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub index_paths_root: PathBuf,
    pub index: Arc<InvertedIndex>,
    pub tokenizer: Tokenizer,
    pub docs: Arc<RwLock<HashMap<DocId, DocMeta>>>,
    pub admin_token: Option<String>,
    /// Held by every admin write and by commit, so a commit saves the index and
    /// the doc map as of the same moment.
    commit_lock: Arc<Mutex<()>>,
}

pub fn build_app_with(config: ServerConfig) -> Result<Router> {
    // Load the whole index at startup
    let index_paths = IndexPaths::new(&config.index_dir);
    let (index, meta) = load_index(&index_paths)?;
    let docs = load_docs(&index_paths)?;
    let app_state = AppState {
        index_paths_root: config.index_dir,
        index: Arc::new(index),
        tokenizer: Tokenizer::new(meta.tokenizer),
        docs: Arc::new(RwLock::new(docs)),
        admin_token: config.admin_token,
        commit_lock: Arc::new(Mutex::new(())),
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/batch", post(index_batch))
        .route("/index/doc/:doc_id", delete(index_delete))
        .route("/index/commit", post(index_commit))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let parser = QueryParser::new(&state.tokenizer).with_implicit_and(params.implicit_and);
    let node = parser.parse(&params.q).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody { error: e.kind.to_string(), position: Some(e.position) }),
        )
    })?;

    let hits = QueryEvaluator::new(&state.index).evaluate(&node);
    let limit = params.limit.min(MAX_LIMIT);
    let docs: Vec<SearchHit> = {
        let meta = state.docs.read();
        hits.iter()
            .take(limit)
            .map(|doc_id| SearchHit { doc_id, path: meta.get(&doc_id).map(|m| m.path.clone()) })
            .collect()
    };
    let total_hits = hits.len();
    tracing::debug!(%node, total_hits, "search");

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        took_s: elapsed.as_secs_f64(),
        total_hits,
        doc_ids: hits.into_iter().collect(),
        docs,
    }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.index.contains_document(doc_id) {
        return Err(api_error(StatusCode::NOT_FOUND, "not found"));
    }
    let path = state.docs.read().get(&doc_id).map(|m| m.path.clone());
    let terms = state.index.document_terms(doc_id).map_or(0, |t| t.len());
    Ok(Json(serde_json::json!({ "doc_id": doc_id, "path": path, "terms": terms })))
}

// --- Admin endpoints ---
async fn index_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(batch): Json<Vec<BatchDoc>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let _guard = state.commit_lock.lock();
    let count = batch.len();
    for doc in batch {
        state.index.index_text(doc.doc_id, &state.tokenizer, &doc.text);
        if let Some(path) = doc.path {
            state.docs.write().insert(doc.doc_id, DocMeta { path });
        }
    }
    tracing::info!(count, num_docs = state.index.num_docs(), "indexed batch");
    Ok(Json(serde_json::json!({ "indexed": count, "num_docs": state.index.num_docs() })))
}

async fn index_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<DocId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let _guard = state.commit_lock.lock();
    if !state.index.remove_document(doc_id) {
        return Err(api_error(StatusCode::NOT_FOUND, "not found"));
    }
    state.docs.write().remove(&doc_id);
    Ok(Json(serde_json::json!({ "removed": doc_id })))
}

async fn index_commit(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let _guard = state.commit_lock.lock();
    let paths = IndexPaths::new(&state.index_paths_root);
    let meta = MetaFile::for_index(&state.index, *state.tokenizer.config());
    let docs = state.docs.read().clone();
    save_index(&paths, &state.index, &meta)
        .and_then(|_| save_docs(&paths, &docs))
        .map_err(|e| {
            tracing::error!(error = %e, "commit failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(Json(serde_json::json!({ "committed": true, "num_docs": meta.num_docs, "num_terms": meta.num_terms })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(api_error(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "invalid admin token"))
    }
}

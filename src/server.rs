//! HTTP server.
//!
//! Exposes projects, articles, relationships and recommendations as a JSON
//! API. Every route except `/health` requires a bearer token (see
//! [`crate::auth`]).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Health check (returns version) |
//! | `GET`, `POST` | `/projects` | List / create projects |
//! | `GET`, `PUT`, `DELETE` | `/projects/{projectId}` | Read / update / delete a project |
//! | `GET` | `/projects/{projectId}/graph` | Article relationship graph |
//! | `GET`, `POST` | `/projects/{projectId}/articles` | List / create articles |
//! | `GET`, `PUT`, `DELETE` | `/projects/{projectId}/articles/{id}` | Read / update / delete an article |
//! | `PATCH` | `.../articles/{id}/status`, `.../articles/{id}/notes` | Screening updates |
//! | `GET`, `POST` | `.../articles/{id}/relationships` | List / add related articles |
//! | `DELETE` | `.../articles/{id}/relationships/{relatedId}` | Remove a relation |
//! | `GET` | `.../articles/{id}/recommendations` | Ranked similar articles |
//! | `POST` | `.../articles/{id}/recommendations/auto-relate` | Link the most similar articles |
//! | `GET` | `/projects/{projectId}/recommendations/insights` | Relationship report |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "title is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `internal` (500). Resources owned by another user are reported as
//! `not_found`.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use synapse_core::cache::EmbeddingCache;
use synapse_core::error::ValidationError;
use synapse_core::recommend::Recommender;
use synapse_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding::ProviderSet;
use crate::sqlite_store::SqliteStore;
use crate::{articles, projects, recommendations};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub recommender: Arc<Recommender>,
    pub providers: Arc<ProviderSet>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, providers: ProviderSet) -> Self {
        let cache = Arc::new(EmbeddingCache::new(config.embedding.cache_capacity));
        Self {
            config: Arc::new(config),
            store,
            recommender: Arc::new(Recommender::new(cache)),
            providers: Arc::new(providers),
        }
    }

    /// Drop cached embeddings for an article whose text changed or vanished.
    pub fn forget_embeddings(&self, article_id: &str) {
        self.recommender.cache().invalidate_article(article_id);
    }
}

/// Build the full router for `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .merge(projects::routes())
        .merge(articles::routes())
        .merge(recommendations::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server against the configured SQLite database.
///
/// Binds to `[server].bind` and runs until the process is terminated.
/// The schema must already exist (`synapse init`).
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let providers = ProviderSet::from_config(&config.embedding)?;
    info!(
        default_provider = %config.embedding.default_provider,
        fallback_only = config.embedding.fallback_only,
        "embedding providers configured"
    );
    let state = AppState::new(config.clone(), store, providers);
    serve(state).await
}

/// Serve an already-built state. Used by [`run_server`] and by tests that
/// inject their own store or providers.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.server.bind.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Synapse listening on http://{}", bind_addr);
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
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

pub fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: message.into(),
    }
}

pub fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Store and other unexpected failures: logged, reported generically.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: "internal server error".to_string(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        bad_request(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, AppError>;

// ============ Pagination ============

/// Page metadata returned by list endpoints.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Slice `items` to 1-based `page` of size `limit`.
pub fn paginate<T>(items: Vec<T>, page: usize, limit: usize) -> ApiResult<(Vec<T>, Pagination)> {
    if page < 1 {
        return Err(bad_request("page must be >= 1"));
    }
    if limit < 1 {
        return Err(bad_request("limit must be >= 1"));
    }

    // page and limit come straight from the query string; an overflowing
    // offset is simply past the end
    let total = items.len();
    let offset = (page - 1).checked_mul(limit).unwrap_or(usize::MAX);
    let pagination = Pagination {
        current_page: page,
        total_pages: total.div_ceil(limit),
        total,
        has_next: page.checked_mul(limit).map_or(false, |end| end < total),
        has_prev: page > 1,
    };
    let page_items = items.into_iter().skip(offset).take(limit).collect();
    Ok((page_items, pagination))
}

// ============ GET /health ============

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

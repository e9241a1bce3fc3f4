//! Axum route handlers for the Jobs API.

use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::QueryRejection, FromRequest, Query, Request, State},
    http::{header, HeaderMap},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::auth::CallerIdentity;
use crate::errors::AppError;
use crate::jobs::history::{delete_history, list_history};
use crate::jobs::models::HistoryEntry;
use crate::jobs::pipeline::{search_jobs, SearchMode, SearchRequest, SearchResponse};
use crate::jobs::smart_search::{smart_search, SmartSearchRequest, SmartSearchResponse};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteHistoryRequest {
    pub job_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteHistoryResponse {
    pub success: bool,
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryListResponse {
    pub jobs: Vec<HistoryEntry>,
}

// ────────────────────────────────────────────────────────────────────────────
// Body extraction
// ────────────────────────────────────────────────────────────────────────────

/// JSON body where an empty body means `T::default()`.
///
/// Anything else must be `application/json` and deserialize cleanly, or the
/// request fails with `INVALID_ARGUMENT` before the handler runs.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = has_json_content_type(req.headers());
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidArgument(e.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        if !is_json {
            return Err(AppError::InvalidArgument(
                "Expected request with `Content-Type: application/json`".to_string(),
            ));
        }
        let Json(value) =
            Json::<T>::from_bytes(&bytes).map_err(|e| AppError::InvalidArgument(e.body_text()))?;
        Ok(Self(value))
    }
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/jobs/search
///
/// Metered search: charges one credit, then serves from cache or runs the
/// full pipeline. An empty body means all defaults.
pub async fn handle_search(
    State(state): State<AppState>,
    caller: CallerIdentity,
    JsonBody(request): JsonBody<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let mode = SearchMode::Metered {
        user_id: caller.user_id,
    };
    Ok(Json(search_jobs(&state, &mode, request).await?))
}

/// GET /api/v1/jobs/search/open
///
/// Unmetered search with fields in the query string.
pub async fn handle_open_search_query(
    State(state): State<AppState>,
    query: Result<Query<SearchRequest>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Query(request) = query.map_err(|e| AppError::InvalidArgument(e.body_text()))?;
    Ok(Json(search_jobs(&state, &SearchMode::Open, request).await?))
}

/// POST /api/v1/jobs/search/open
///
/// Unmetered search with fields in a JSON body.
pub async fn handle_open_search_body(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    Ok(Json(search_jobs(&state, &SearchMode::Open, request).await?))
}

/// POST /api/v1/jobs/smart-search
pub async fn handle_smart_search(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SmartSearchRequest>,
) -> Result<Json<SmartSearchResponse>, AppError> {
    Ok(Json(smart_search(&state.store, request).await?))
}

/// GET /api/v1/jobs/history
pub async fn handle_list_history(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<HistoryListResponse>, AppError> {
    let jobs = list_history(state.store.as_ref(), &caller.user_id).await?;
    Ok(Json(HistoryListResponse { jobs }))
}

/// POST /api/v1/jobs/history/delete
///
/// Deleting an entry that does not exist still succeeds.
pub async fn handle_delete_history(
    State(state): State<AppState>,
    caller: CallerIdentity,
    JsonBody(request): JsonBody<DeleteHistoryRequest>,
) -> Result<Json<DeleteHistoryResponse>, AppError> {
    let job_id = request
        .job_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::InvalidArgument("jobId is required".to_string()))?;

    let existed = delete_history(state.store.as_ref(), &caller.user_id, &job_id).await?;
    if !existed {
        tracing::debug!("History entry {job_id} for user {} was already gone", caller.user_id);
    }

    Ok(Json(DeleteHistoryResponse {
        success: true,
        job_id,
    }))
}

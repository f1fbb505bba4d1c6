//! Quote search endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use search::{FilterState, SearchContext, SearchSnapshot, SupplierQuote};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Refines this session when set; starts a new one otherwise.
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub context: SearchContext,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub session_id: Uuid,
    pub quotes: Vec<SupplierQuote>,
}

/// POST /search — new or refined search. Replaces the visible results.
#[tracing::instrument(skip(state, req), fields(destination = %req.context.destination))]
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchSnapshot>, ApiError> {
    let snapshot = state.search.search(req.session_id, req.context).await?;
    Ok(Json(snapshot))
}

/// POST /search/{session_id}/more — next page, appended to the results.
#[tracing::instrument(skip(state))]
pub async fn load_more(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SearchSnapshot>, ApiError> {
    Ok(Json(state.search.load_more(session_id).await?))
}

/// POST /search/{session_id}/view — sort and filter without a new search.
#[tracing::instrument(skip(state, filter))]
pub async fn view(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(filter): Json<FilterState>,
) -> Result<Json<ViewResponse>, ApiError> {
    let quotes = state.search.view(session_id, &filter).await?;
    Ok(Json(ViewResponse { session_id, quotes }))
}

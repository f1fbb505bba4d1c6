//! Success-page hand-off token verification.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use saga::HandoffToken;

use crate::AppState;
use crate::error::ApiError;

/// GET /handoff/{token} — the success page exchanges its token for the
/// booking summary. Tampered or malformed tokens are rejected.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<HandoffToken>, ApiError> {
    Ok(Json(state.checkout.verify_handoff(&token)?))
}

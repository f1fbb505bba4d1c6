//! Operator endpoints for bookings charged but not finalized.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use saga::{CallerRole, CheckoutOutcome};

use super::checkouts::SagaStatusResponse;
use super::{CallerHeader, parse_ref};
use crate::AppState;
use crate::error::ApiError;

/// GET /reconciliations
pub async fn list(
    State(state): State<Arc<AppState>>,
    CallerHeader(caller): CallerHeader,
) -> Result<Json<Vec<SagaStatusResponse>>, ApiError> {
    if caller.role != CallerRole::Operator {
        return Err(ApiError::Forbidden(
            "only operators can list pending reconciliations".to_string(),
        ));
    }

    let pending = state.checkout.pending_reconciliations().await?;
    Ok(Json(
        pending
            .iter()
            .filter_map(SagaStatusResponse::from_saga)
            .collect(),
    ))
}

/// POST /reconciliations/{booking_ref} — retries finalization without
/// touching the payment.
#[tracing::instrument(skip(state))]
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    Path(booking_ref): Path<String>,
    CallerHeader(caller): CallerHeader,
) -> Result<Json<CheckoutOutcome>, ApiError> {
    let booking_ref = parse_ref(&booking_ref)?;
    let outcome = state.checkout.reconcile(&booking_ref, &caller).await?;
    Ok(Json(outcome))
}

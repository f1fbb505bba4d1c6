//! Checkout saga endpoints: reserve, reprice, pay and abandon.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use common::{BookingRef, Currency, Money};
use domain::{Aggregate, BookingDraft, DraftPayload, Payer, Stay, Traveller};
use saga::{CheckoutOutcome, CheckoutSaga, RecomputeRequest, SettleRequest, SettlementState};
use search::QuoteSelection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CallerHeader, parse_ref};
use crate::AppState;
use crate::error::ApiError;

/// The room is named by its place in a search session. Price and stay
/// come from the session, not from the request body.
#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub session_id: Uuid,
    pub selection: QuoteSelection,
    pub travellers: Vec<Traveller>,
    pub payer: Payer,
    /// Falls back to the configured gateway.
    #[serde(default)]
    pub payment_gateway: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SagaStatusResponse {
    pub booking_ref: BookingRef,
    pub state: SettlementState,
    pub attempts: u32,
    pub amount: Option<Money>,
    pub currency: Option<Currency>,
    pub payment_intent_id: Option<String>,
    pub finalized: bool,
    pub reconciliation_required: bool,
    pub last_failure: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SagaStatusResponse {
    /// Sagas without a reference are not yet reserved and are skipped.
    pub(crate) fn from_saga(saga: &CheckoutSaga) -> Option<Self> {
        saga.booking_ref().cloned().map(|r| Self::new(r, saga))
    }

    fn new(booking_ref: BookingRef, saga: &CheckoutSaga) -> Self {
        Self {
            booking_ref,
            state: saga.state(),
            attempts: saga.attempts(),
            amount: saga.amount(),
            currency: saga.currency().cloned(),
            payment_intent_id: saga.payment_intent_id().map(str::to_string),
            finalized: saga.is_finalized(),
            reconciliation_required: saga.reconciliation_required(),
            last_failure: saga.last_failure().map(str::to_string),
            updated_at: saga.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AbandonResponse {
    pub booking_ref: BookingRef,
    pub abandoned: bool,
}

/// POST /checkouts/{booking_ref}/reserve
///
/// Returns 201 for a new reservation and 200 when the reference was
/// already reserved.
#[tracing::instrument(skip(state, req))]
pub async fn reserve(
    State(state): State<Arc<AppState>>,
    Path(booking_ref): Path<String>,
    Json(req): Json<ReserveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking_ref = parse_ref(&booking_ref)?;
    let selected = state.search.select(req.session_id, &req.selection).await?;
    let payment_gateway = req
        .payment_gateway
        .unwrap_or_else(|| state.checkout.config().payment_gateway.clone());

    let receipt = state
        .checkout
        .reserve(DraftPayload {
            booking_ref,
            stay: Stay::from(&selected.context),
            quote: selected.quote,
            travellers: req.travellers,
            payer: req.payer,
            payment_gateway,
        })
        .await?;

    let status = if receipt.deduplicated {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(receipt)))
}

/// POST /checkouts/{booking_ref}/financials — agent repricing.
#[tracing::instrument(skip(state, req))]
pub async fn recompute_financials(
    State(state): State<Arc<AppState>>,
    Path(booking_ref): Path<String>,
    CallerHeader(caller): CallerHeader,
    Json(req): Json<RecomputeRequest>,
) -> Result<Json<BookingDraft>, ApiError> {
    let booking_ref = parse_ref(&booking_ref)?;
    let draft = state
        .checkout
        .recompute_financials(&booking_ref, &caller, req)
        .await?;
    Ok(Json(draft))
}

/// POST /checkouts/{booking_ref}/pay
///
/// Declined and failed attempts answer 402 with the outcome body; the
/// client may submit another card.
#[tracing::instrument(skip(state, req))]
pub async fn pay(
    State(state): State<Arc<AppState>>,
    Path(booking_ref): Path<String>,
    Json(req): Json<SettleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking_ref = parse_ref(&booking_ref)?;
    let outcome = state.checkout.settle(&booking_ref, req).await?;

    let status = match outcome {
        CheckoutOutcome::Declined { .. } | CheckoutOutcome::Failed { .. } => {
            StatusCode::PAYMENT_REQUIRED
        }
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

/// POST /checkouts/{booking_ref}/abandon
pub async fn abandon(
    State(state): State<Arc<AppState>>,
    Path(booking_ref): Path<String>,
) -> Result<Json<AbandonResponse>, ApiError> {
    let booking_ref = parse_ref(&booking_ref)?;
    let abandoned = state.checkout.abandon(&booking_ref).await?;
    Ok(Json(AbandonResponse {
        booking_ref,
        abandoned,
    }))
}

/// GET /checkouts/{booking_ref}
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(booking_ref): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let booking_ref = parse_ref(&booking_ref)?;
    let saga = state.checkout.get_saga(&booking_ref).await?;
    Ok(Json(SagaStatusResponse::new(booking_ref, &saga)))
}

//! Booking read and cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::BookingRef;
use domain::{BookingDraft, BookingStatus, Financials, HotelSnapshot, Stay, Traveller};
use saga::CancellationResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parse_ref;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking_ref: BookingRef,
    pub status: BookingStatus,
    pub financials: Financials,
    pub hotel: Option<HotelSnapshot>,
    pub stay: Option<Stay>,
    pub travellers: Vec<Traveller>,
    pub payment_gateway: Option<String>,
    pub payment_intent_id: Option<String>,
    pub cancellation_allowed: bool,
    pub cancellation_requested: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl BookingResponse {
    fn new(booking_ref: BookingRef, draft: &BookingDraft) -> Self {
        Self {
            booking_ref,
            status: draft.status(),
            financials: *draft.financials(),
            hotel: draft.hotel().cloned(),
            stay: draft.stay().cloned(),
            travellers: draft.travellers().to_vec(),
            payment_gateway: draft.payment_gateway().map(str::to_string),
            payment_intent_id: draft.payment_intent_id().map(str::to_string),
            cancellation_allowed: draft.cancellation_allowed(),
            cancellation_requested: draft.cancellation_requested(),
            created_at: draft.created_at(),
            updated_at: draft.updated_at(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub version: i64,
    pub entry_type: String,
    pub recorded_at: DateTime<Utc>,
    pub payload: Value,
}

/// GET /bookings/{booking_ref}
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(booking_ref): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_ref = parse_ref(&booking_ref)?;
    let draft = state.checkout.bookings().get_booking(&booking_ref).await?;
    Ok(Json(BookingResponse::new(booking_ref, &draft)))
}

/// POST /bookings/{booking_ref}/cancel
#[tracing::instrument(skip(state, body))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(booking_ref): Path<String>,
    Json(body): Json<CancelBody>,
) -> Result<Json<CancellationResult>, ApiError> {
    let booking_ref = parse_ref(&booking_ref)?;
    let result = state.checkout.cancel(&booking_ref, body.reason).await?;
    Ok(Json(result))
}

/// GET /bookings/{booking_ref}/events — the booking's ledger entries in order.
pub async fn events(
    State(state): State<Arc<AppState>>,
    Path(booking_ref): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let booking_ref = parse_ref(&booking_ref)?;
    let entries = state.checkout.bookings().history(&booking_ref).await?;
    if entries.is_empty() {
        return Err(ApiError::NotFound(format!("booking {booking_ref} not found")));
    }

    Ok(Json(
        entries
            .into_iter()
            .map(|entry| HistoryEntry {
                version: entry.version.as_i64(),
                entry_type: entry.entry_type,
                recorded_at: entry.recorded_at,
                payload: entry.payload,
            })
            .collect(),
    ))
}

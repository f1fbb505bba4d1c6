//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::BookingRef;
use domain::{BookingError, DomainError};
use ledger::LedgerError;
use saga::SagaError;
use search::SearchError;

/// API-level error type that maps to HTTP responses.
///
/// The body is `{"error": message, "booking_ref": ref}`; `booking_ref` is
/// null when the error is not tied to a booking.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Domain(DomainError),
    Saga(SagaError),
    Search(SearchError),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, booking_ref) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            ApiError::Domain(err) => {
                let booking_ref = domain_booking_ref(&err);
                (domain_status(&err), err.to_string(), booking_ref)
            }
            ApiError::Saga(err) => {
                let booking_ref = err.booking_ref().cloned();
                (saga_status(&err), err.to_string(), booking_ref)
            }
            ApiError::Search(err) => {
                let status = match err {
                    SearchError::InvalidContext(_) => StatusCode::BAD_REQUEST,
                    SearchError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                    SearchError::QuoteNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                };
                (status, err.to_string(), None)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        metrics::counter!("api_errors_total", "status" => status.as_u16().to_string())
            .increment(1);
        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message, "booking_ref": booking_ref });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_booking_ref(err: &DomainError) -> Option<BookingRef> {
    match err {
        DomainError::NotFound { booking_ref, .. } => Some(booking_ref.clone()),
        _ => None,
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Booking(booking_err) => match booking_err {
            BookingError::InvalidStateTransition { .. }
            | BookingError::NotReserved
            | BookingError::FinancialsImmutable
            | BookingError::AlreadyPaid
            | BookingError::CancellationNotAllowed(_)
            | BookingError::CancellationInFlight
            | BookingError::NoCancellationInFlight => StatusCode::CONFLICT,
            BookingError::TravellerCount { .. }
            | BookingError::TravellerSplit { .. }
            | BookingError::InvalidTraveller { .. }
            | BookingError::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
        },
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Ledger(ledger_err) => ledger_status(ledger_err),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
        LedgerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::ReservationFailed { .. }
        | SagaError::PaymentSetupFailed { .. }
        | SagaError::FinalizationFailed { .. }
        | SagaError::CancellationFailed { .. }
        | SagaError::FinancialService(_) => StatusCode::BAD_GATEWAY,
        SagaError::NotReserved(_)
        | SagaError::SettlementInProgress(_)
        | SagaError::InvalidSettlementState { .. }
        | SagaError::NothingToReconcile(_)
        | SagaError::CancellationNotAllowed { .. } => StatusCode::CONFLICT,
        SagaError::Forbidden(_) => StatusCode::FORBIDDEN,
        SagaError::InvalidToken(_) => StatusCode::BAD_REQUEST,
        SagaError::Domain(domain_err) => domain_status(domain_err),
        SagaError::Ledger(ledger_err) => ledger_status(ledger_err),
        SagaError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        ApiError::Search(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saga_statuses() {
        let r = BookingRef::parse("TT-1").unwrap();
        assert_eq!(
            saga_status(&SagaError::PaymentSetupFailed {
                booking_ref: r.clone(),
                reason: "x".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            saga_status(&SagaError::CancellationNotAllowed {
                booking_ref: r.clone(),
                reason: "x".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            saga_status(&SagaError::Domain(DomainError::NotFound {
                aggregate_type: "Booking",
                booking_ref: r
            })),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_domain_statuses() {
        assert_eq!(
            domain_status(&DomainError::Booking(BookingError::FinancialsImmutable)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            domain_status(&DomainError::Ledger(LedgerError::Unavailable("down".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}

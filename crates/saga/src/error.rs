//! Saga error types.

use common::BookingRef;
use domain::DomainError;
use ledger::LedgerError;
use thiserror::Error;

use crate::state::SettlementState;

/// Errors that can occur during checkout operations.
///
/// Every variant tied to a checkout carries the booking reference so the
/// message a user sees always identifies the booking.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("Reservation failed for booking {booking_ref}: {reason}")]
    ReservationFailed {
        booking_ref: BookingRef,
        reason: String,
    },

    /// Settlement was attempted before the reference was reserved.
    #[error("Booking {0} has not been reserved")]
    NotReserved(BookingRef),

    #[error("Payment setup failed for booking {booking_ref}: {reason}")]
    PaymentSetupFailed {
        booking_ref: BookingRef,
        reason: String,
    },

    #[error("A payment attempt is already in progress for booking {0}")]
    SettlementInProgress(BookingRef),

    #[error("Booking {booking_ref} cannot start a payment attempt from {state}")]
    InvalidSettlementState {
        booking_ref: BookingRef,
        state: SettlementState,
    },

    #[error("Finalization failed for booking {booking_ref}: {reason}")]
    FinalizationFailed {
        booking_ref: BookingRef,
        reason: String,
    },

    #[error("Booking {0} has nothing to reconcile")]
    NothingToReconcile(BookingRef),

    #[error("Cancellation not allowed for booking {booking_ref}: {reason}")]
    CancellationNotAllowed {
        booking_ref: BookingRef,
        reason: String,
    },

    #[error("Cancellation failed for booking {booking_ref}: {message}")]
    CancellationFailed {
        booking_ref: BookingRef,
        message: String,
    },

    #[error("Financial service error: {0}")]
    FinancialService(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid hand-off token: {0}")]
    InvalidToken(String),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    pub fn booking_ref(&self) -> Option<&BookingRef> {
        match self {
            SagaError::ReservationFailed { booking_ref, .. }
            | SagaError::PaymentSetupFailed { booking_ref, .. }
            | SagaError::InvalidSettlementState { booking_ref, .. }
            | SagaError::FinalizationFailed { booking_ref, .. }
            | SagaError::CancellationNotAllowed { booking_ref, .. }
            | SagaError::CancellationFailed { booking_ref, .. } => Some(booking_ref),
            SagaError::NotReserved(booking_ref)
            | SagaError::SettlementInProgress(booking_ref)
            | SagaError::NothingToReconcile(booking_ref) => Some(booking_ref),
            SagaError::Domain(DomainError::NotFound { booking_ref, .. }) => Some(booking_ref),
            _ => None,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

//! Domain error types.

use common::BookingRef;
use ledger::LedgerError;
use thiserror::Error;

use crate::booking::BookingError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Booking error: {0}")]
    Booking(#[from] BookingError),

    #[error("{aggregate_type} not found for booking {booking_ref}")]
    NotFound {
        aggregate_type: &'static str,
        booking_ref: BookingRef,
    },

    #[error("Incomplete ledger entry for {0}")]
    IncompleteEntry(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// True when a concurrent writer got to the stream first.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::Ledger(LedgerError::ConcurrencyConflict { .. })
        )
    }
}

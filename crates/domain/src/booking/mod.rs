//! Booking draft aggregate and its service.

mod aggregate;
mod commands;
mod events;
mod payloads;
mod service;
mod state;
mod value_objects;

pub use aggregate::BookingDraft;
pub use commands::{
    CompleteCancellation, FailCancellation, PersistFinalize, RecomputeFinancials,
    RequestCancellation, ReserveDraft,
};
pub use events::{
    BookingCancelledData, BookingEvent, BookingFinalizedData, CancellationFailedData,
    CancellationRequestedData, DetailsPersistedData, DraftReservedData, FinancialsRecomputedData,
};
pub use payloads::{BookingPayload, CancelRequest, DraftPayload, FinalizePayload, FinalizeStatus};
pub use service::BookingService;
pub use state::BookingStatus;
pub use value_objects::{
    Financials, HotelSnapshot, Payer, Stay, Traveller, TravellerType, validate_travellers,
};

use thiserror::Error;

/// Errors that can occur on booking operations.
#[derive(Debug, Clone, Error)]
pub enum BookingError {
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: BookingStatus,
        action: &'static str,
    },

    /// The booking reference has no draft yet.
    #[error("Booking has not been reserved")]
    NotReserved,

    #[error("Expected {expected} travellers, got {actual}")]
    TravellerCount { expected: usize, actual: usize },

    #[error("Travellers must be {adults} adults and {children} children")]
    TravellerSplit { adults: u32, children: u32 },

    #[error("Traveller {index} is invalid: {reason}")]
    InvalidTraveller { index: usize, reason: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Financials are immutable once the booking is paid")]
    FinancialsImmutable,

    #[error("Booking is already paid with a different payment")]
    AlreadyPaid,

    #[error("Cancellation not allowed: {0}")]
    CancellationNotAllowed(String),

    #[error("A cancellation request is already in flight")]
    CancellationInFlight,

    #[error("No cancellation request is in flight")]
    NoCancellationInFlight,
}

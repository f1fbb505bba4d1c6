//! Domain layer for the booking settlement pipeline.
//!
//! This crate provides:
//! - the `Aggregate` and `DomainEvent` traits for ledger-sourced entities
//! - `CommandHandler`, which replays a booking's stream and appends new entries
//! - the `BookingDraft` aggregate with its per-phase payloads and `BookingService`

pub mod aggregate;
pub mod booking;
pub mod command;
pub mod error;

pub use aggregate::{Aggregate, DomainEvent};
pub use booking::{
    BookingDraft, BookingError, BookingEvent, BookingPayload, BookingService, BookingStatus,
    CancelRequest, CompleteCancellation, DraftPayload, FailCancellation, FinalizePayload,
    FinalizeStatus, Financials, HotelSnapshot, Payer, PersistFinalize, RecomputeFinancials,
    RequestCancellation, ReserveDraft, Stay, Traveller, TravellerType, validate_travellers,
};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;

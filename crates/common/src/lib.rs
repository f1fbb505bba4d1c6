//! Shared types for the booking settlement pipeline.

pub mod money;
pub mod types;

pub use money::{Currency, InvalidCurrency, Money};
pub use types::{BookingRef, InvalidBookingRef};

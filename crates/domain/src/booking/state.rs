//! Booking status state machine.

use serde::{Deserialize, Serialize};

/// The status of a booking draft.
///
/// State transitions:
/// ```text
/// Pending ──► Unpaid ──► Paid
///    │           │         │
///    └───────────┴─────────┴──► Cancelled (confirmed bookings only)
/// ```
///
/// `Pending` is the provisional reservation. `Unpaid` means traveller and
/// payment details were persisted while the charge is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Pending,

    Unpaid,

    /// Authorization succeeded and the booking was finalized.
    Paid,

    /// Terminal. There is no un-cancel.
    Cancelled,
}

impl BookingStatus {
    /// Financials may only be recomputed before payment.
    pub fn can_recompute(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Unpaid)
    }

    pub fn can_persist_details(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Unpaid)
    }

    pub fn can_finalize(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Unpaid)
    }

    /// Confirmed bookings are the only ones that can be cancelled.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, BookingStatus::Unpaid | BookingStatus::Paid)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Unpaid => "unpaid",
            BookingStatus::Paid => "paid",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_default() {
        assert_eq!(BookingStatus::default(), BookingStatus::Pending);
    }

    #[test]
    fn financials_frozen_after_payment() {
        assert!(BookingStatus::Pending.can_recompute());
        assert!(BookingStatus::Unpaid.can_recompute());
        assert!(!BookingStatus::Paid.can_recompute());
        assert!(!BookingStatus::Cancelled.can_recompute());
    }

    #[test]
    fn only_confirmed_bookings_are_cancellable() {
        assert!(!BookingStatus::Pending.is_confirmed());
        assert!(BookingStatus::Unpaid.is_confirmed());
        assert!(BookingStatus::Paid.is_confirmed());
        assert!(!BookingStatus::Cancelled.is_confirmed());
    }

    #[test]
    fn finalize_not_allowed_twice() {
        assert!(BookingStatus::Unpaid.can_finalize());
        assert!(!BookingStatus::Paid.can_finalize());
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::Unpaid).unwrap(),
            "\"unpaid\""
        );
        assert_eq!(BookingStatus::Cancelled.to_string(), "cancelled");
    }
}

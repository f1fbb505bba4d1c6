//! What checkout operations hand back to the caller.

use common::BookingRef;
use domain::BookingStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveReceipt {
    pub booking_ref: BookingRef,
    /// True when the reference was already reserved or a reservation was in
    /// flight; nothing was written.
    pub deduplicated: bool,
}

/// Result of a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Confirmed {
        booking_ref: BookingRef,
        redirect_url: String,
    },
    /// The card was charged but the booking could not be finalized. The
    /// client still gets the success redirect.
    PaidPendingReconciliation {
        booking_ref: BookingRef,
        warning: String,
        redirect_url: String,
    },
    /// The gateway refused the card. `message` is the gateway's text.
    Declined {
        booking_ref: BookingRef,
        message: String,
    },
    Failed {
        booking_ref: BookingRef,
        message: String,
    },
    /// The client navigated away during authorization.
    Abandoned { booking_ref: BookingRef },
}

impl CheckoutOutcome {
    pub fn paid_pending_reconciliation(booking_ref: BookingRef, redirect_url: String) -> Self {
        CheckoutOutcome::PaidPendingReconciliation {
            warning: format!(
                "payment taken, booking pending manual reconciliation (ref {booking_ref})"
            ),
            booking_ref,
            redirect_url,
        }
    }

    pub fn booking_ref(&self) -> &BookingRef {
        match self {
            CheckoutOutcome::Confirmed { booking_ref, .. }
            | CheckoutOutcome::PaidPendingReconciliation { booking_ref, .. }
            | CheckoutOutcome::Declined { booking_ref, .. }
            | CheckoutOutcome::Failed { booking_ref, .. }
            | CheckoutOutcome::Abandoned { booking_ref } => booking_ref,
        }
    }

    /// Whether the card was charged.
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            CheckoutOutcome::Confirmed { .. } | CheckoutOutcome::PaidPendingReconciliation { .. }
        )
    }

    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            CheckoutOutcome::Confirmed { redirect_url, .. }
            | CheckoutOutcome::PaidPendingReconciliation { redirect_url, .. } => {
                Some(redirect_url)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationResult {
    pub booking_ref: BookingRef,
    pub status: BookingStatus,
    pub message: String,
}

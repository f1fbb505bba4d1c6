//! Checkout saga events.

use chrono::{DateTime, Utc};
use common::{BookingRef, Currency, Money};
use domain::DomainEvent;
use serde::{Deserialize, Serialize};

/// Events recorded on a checkout saga's ledger stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    /// The booking reference was reserved with a draft.
    ReservationConfirmed(ReservationConfirmedData),

    /// A payment attempt started and an intent was requested.
    AttemptStarted(AttemptStartedData),

    /// The gateway returned an intent with a client secret.
    IntentCreated(IntentCreatedData),

    /// The intent call failed or returned no client secret.
    IntentFailed(AttemptFailedData),

    /// The concurrent details write failed. Carried forward to finalization.
    DetailsPersistFailed(AttemptFailedData),

    AuthorizationStarted(AttemptData),

    PaymentAuthorized(PaymentAuthorizedData),

    /// The gateway declined; a new attempt is allowed.
    PaymentDeclined(AttemptFailedData),

    /// The gateway errored or timed out; a new attempt is allowed.
    AuthorizationFailed(AttemptFailedData),

    /// The user navigated away while authorizing.
    AttemptAbandoned(AttemptData),

    /// The booking was persisted as paid.
    BookingFinalized(BookingFinalizedData),

    /// Payment was taken but the booking could not be finalized.
    ReconciliationRequired(ReconciliationRequiredData),
}

impl DomainEvent for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::ReservationConfirmed(_) => "ReservationConfirmed",
            CheckoutEvent::AttemptStarted(_) => "AttemptStarted",
            CheckoutEvent::IntentCreated(_) => "IntentCreated",
            CheckoutEvent::IntentFailed(_) => "IntentFailed",
            CheckoutEvent::DetailsPersistFailed(_) => "DetailsPersistFailed",
            CheckoutEvent::AuthorizationStarted(_) => "AuthorizationStarted",
            CheckoutEvent::PaymentAuthorized(_) => "PaymentAuthorized",
            CheckoutEvent::PaymentDeclined(_) => "PaymentDeclined",
            CheckoutEvent::AuthorizationFailed(_) => "AuthorizationFailed",
            CheckoutEvent::AttemptAbandoned(_) => "AttemptAbandoned",
            CheckoutEvent::BookingFinalized(_) => "BookingFinalized",
            CheckoutEvent::ReconciliationRequired(_) => "ReconciliationRequired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationConfirmedData {
    pub booking_ref: BookingRef,
    pub reserved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptStartedData {
    pub attempt: u32,
    /// Amount requested from the gateway, in minor units.
    pub amount: Money,
    pub currency: Currency,
    pub started_at: DateTime<Utc>,
}

/// Data for events that only identify the attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptData {
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentCreatedData {
    pub attempt: u32,
    /// The client secret is deliberately not recorded.
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptFailedData {
    pub attempt: u32,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAuthorizedData {
    pub attempt: u32,
    pub payment_intent_id: String,
    pub authorized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingFinalizedData {
    pub payment_intent_id: String,
    /// True when an operator finalized the booking after a failure.
    pub reconciled: bool,
    pub finalized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRequiredData {
    pub payment_intent_id: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

// Helper constructors
impl CheckoutEvent {
    pub fn reservation_confirmed(booking_ref: BookingRef) -> Self {
        CheckoutEvent::ReservationConfirmed(ReservationConfirmedData {
            booking_ref,
            reserved_at: Utc::now(),
        })
    }

    pub fn attempt_started(attempt: u32, amount: Money, currency: Currency) -> Self {
        CheckoutEvent::AttemptStarted(AttemptStartedData {
            attempt,
            amount,
            currency,
            started_at: Utc::now(),
        })
    }

    pub fn intent_created(attempt: u32, payment_intent_id: impl Into<String>) -> Self {
        CheckoutEvent::IntentCreated(IntentCreatedData {
            attempt,
            payment_intent_id: payment_intent_id.into(),
        })
    }

    pub fn intent_failed(attempt: u32, message: impl Into<String>) -> Self {
        CheckoutEvent::IntentFailed(failed(attempt, message))
    }

    pub fn details_persist_failed(attempt: u32, message: impl Into<String>) -> Self {
        CheckoutEvent::DetailsPersistFailed(failed(attempt, message))
    }

    pub fn authorization_started(attempt: u32) -> Self {
        CheckoutEvent::AuthorizationStarted(AttemptData {
            attempt,
            at: Utc::now(),
        })
    }

    pub fn payment_authorized(attempt: u32, payment_intent_id: impl Into<String>) -> Self {
        CheckoutEvent::PaymentAuthorized(PaymentAuthorizedData {
            attempt,
            payment_intent_id: payment_intent_id.into(),
            authorized_at: Utc::now(),
        })
    }

    pub fn payment_declined(attempt: u32, message: impl Into<String>) -> Self {
        CheckoutEvent::PaymentDeclined(failed(attempt, message))
    }

    pub fn authorization_failed(attempt: u32, message: impl Into<String>) -> Self {
        CheckoutEvent::AuthorizationFailed(failed(attempt, message))
    }

    pub fn attempt_abandoned(attempt: u32) -> Self {
        CheckoutEvent::AttemptAbandoned(AttemptData {
            attempt,
            at: Utc::now(),
        })
    }

    pub fn booking_finalized(payment_intent_id: impl Into<String>, reconciled: bool) -> Self {
        CheckoutEvent::BookingFinalized(BookingFinalizedData {
            payment_intent_id: payment_intent_id.into(),
            reconciled,
            finalized_at: Utc::now(),
        })
    }

    pub fn reconciliation_required(
        payment_intent_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CheckoutEvent::ReconciliationRequired(ReconciliationRequiredData {
            payment_intent_id: payment_intent_id.into(),
            reason: reason.into(),
            at: Utc::now(),
        })
    }
}

fn failed(attempt: u32, message: impl Into<String>) -> AttemptFailedData {
    AttemptFailedData {
        attempt,
        message: message.into(),
        at: Utc::now(),
    }
}

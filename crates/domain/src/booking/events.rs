//! Booking domain events.

use chrono::{DateTime, Utc};
use common::{BookingRef, Money};
use search::SupplierQuote;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{Financials, HotelSnapshot, Payer, Stay, Traveller};

/// Events recorded on a booking's ledger stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BookingEvent {
    /// A booking reference was reserved with a provisional draft.
    DraftReserved(DraftReservedData),

    /// An agent recomputation replaced the quote snapshot and totals.
    FinancialsRecomputed(FinancialsRecomputedData),

    /// Traveller and payment details were stored while payment is outstanding.
    DetailsPersisted(DetailsPersistedData),

    /// Payment was authorized and the booking finalized.
    BookingFinalized(BookingFinalizedData),

    CancellationRequested(CancellationRequestedData),

    BookingCancelled(BookingCancelledData),

    /// The cancellation API refused or failed; the booking is unchanged.
    CancellationFailed(CancellationFailedData),
}

impl DomainEvent for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::DraftReserved(_) => "DraftReserved",
            BookingEvent::FinancialsRecomputed(_) => "FinancialsRecomputed",
            BookingEvent::DetailsPersisted(_) => "DetailsPersisted",
            BookingEvent::BookingFinalized(_) => "BookingFinalized",
            BookingEvent::CancellationRequested(_) => "CancellationRequested",
            BookingEvent::BookingCancelled(_) => "BookingCancelled",
            BookingEvent::CancellationFailed(_) => "CancellationFailed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftReservedData {
    pub booking_ref: BookingRef,

    /// The selected room as quoted.
    pub quote: SupplierQuote,

    pub hotel: HotelSnapshot,

    pub stay: Stay,

    pub travellers: Vec<Traveller>,

    /// Totals pre-populated from the quote.
    pub financials: Financials,

    pub payer: Payer,

    pub payment_gateway: String,

    pub reserved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialsRecomputedData {
    pub quote: SupplierQuote,
    pub financials: Financials,
    pub recomputed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailsPersistedData {
    pub travellers: Vec<Traveller>,
    pub payment_gateway: String,
    pub payment_intent_id: Option<String>,
    pub persisted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingFinalizedData {
    pub payment_intent_id: String,
    pub payment_gateway: String,
    pub travellers: Vec<Traveller>,

    /// Taken from the draft's financials at finalization time.
    pub amount_paid: Money,

    pub finalized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationRequestedData {
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCancelledData {
    pub message: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationFailedData {
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

// Helper constructors
impl BookingEvent {
    pub fn financials_recomputed(quote: SupplierQuote, financials: Financials) -> Self {
        BookingEvent::FinancialsRecomputed(FinancialsRecomputedData {
            quote,
            financials,
            recomputed_at: Utc::now(),
        })
    }

    pub fn details_persisted(
        travellers: Vec<Traveller>,
        payment_gateway: String,
        payment_intent_id: Option<String>,
    ) -> Self {
        BookingEvent::DetailsPersisted(DetailsPersistedData {
            travellers,
            payment_gateway,
            payment_intent_id,
            persisted_at: Utc::now(),
        })
    }

    pub fn booking_finalized(
        payment_intent_id: String,
        payment_gateway: String,
        travellers: Vec<Traveller>,
        amount_paid: Money,
    ) -> Self {
        BookingEvent::BookingFinalized(BookingFinalizedData {
            payment_intent_id,
            payment_gateway,
            travellers,
            amount_paid,
            finalized_at: Utc::now(),
        })
    }

    pub fn cancellation_requested(reason: Option<String>) -> Self {
        BookingEvent::CancellationRequested(CancellationRequestedData {
            reason,
            requested_at: Utc::now(),
        })
    }

    pub fn booking_cancelled(message: impl Into<String>) -> Self {
        BookingEvent::BookingCancelled(BookingCancelledData {
            message: message.into(),
            cancelled_at: Utc::now(),
        })
    }

    pub fn cancellation_failed(message: impl Into<String>) -> Self {
        BookingEvent::CancellationFailed(CancellationFailedData {
            message: message.into(),
            failed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_match_entry_names() {
        assert_eq!(
            BookingEvent::booking_cancelled("ok").event_type(),
            "BookingCancelled"
        );
        assert_eq!(
            BookingEvent::cancellation_requested(None).event_type(),
            "CancellationRequested"
        );
    }

    #[test]
    fn serialized_with_type_and_data() {
        let event = BookingEvent::cancellation_failed("supplier refused");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "CancellationFailed");
        assert_eq!(json["data"]["message"], "supplier refused");

        let back: BookingEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}

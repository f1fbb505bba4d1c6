//! Booking draft aggregate.

use chrono::{DateTime, Utc};
use common::{BookingRef, Money};
use ledger::Version;
use search::SupplierQuote;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    BookingError, BookingEvent, BookingStatus, DraftPayload, FinalizePayload, FinalizeStatus,
    Financials, HotelSnapshot, Payer, Stay, Traveller, events::DraftReservedData,
    validate_travellers,
};

/// The booking record from provisional reservation to payment or cancellation.
///
/// There is exactly one draft per booking reference. It is never deleted;
/// cancellation is a one-way status change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingDraft {
    booking_ref: Option<BookingRef>,

    #[serde(default)]
    version: Version,

    status: BookingStatus,

    financials: Financials,

    travellers: Vec<Traveller>,

    hotel: Option<HotelSnapshot>,

    /// Room snapshot: the selected quote, or the agent's recomputed one.
    quote: Option<SupplierQuote>,

    stay: Option<Stay>,

    payment_gateway: Option<String>,

    payment_intent_id: Option<String>,

    payer: Option<Payer>,

    cancellation_requested: bool,

    created_at: Option<DateTime<Utc>>,

    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for BookingDraft {
    type Event = BookingEvent;
    type Error = BookingError;

    fn aggregate_type() -> &'static str {
        "Booking"
    }

    fn booking_ref(&self) -> Option<&BookingRef> {
        self.booking_ref.as_ref()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            BookingEvent::DraftReserved(data) => self.apply_draft_reserved(data),
            BookingEvent::FinancialsRecomputed(data) => {
                self.hotel = Some(HotelSnapshot::from(&data.quote));
                self.quote = Some(data.quote);
                self.financials = data.financials;
                self.updated_at = Some(data.recomputed_at);
            }
            BookingEvent::DetailsPersisted(data) => {
                self.travellers = data.travellers;
                self.payment_gateway = Some(data.payment_gateway);
                if data.payment_intent_id.is_some() {
                    self.payment_intent_id = data.payment_intent_id;
                }
                self.status = BookingStatus::Unpaid;
                self.updated_at = Some(data.persisted_at);
            }
            BookingEvent::BookingFinalized(data) => {
                self.travellers = data.travellers;
                self.payment_gateway = Some(data.payment_gateway);
                self.payment_intent_id = Some(data.payment_intent_id);
                self.status = BookingStatus::Paid;
                self.updated_at = Some(data.finalized_at);
            }
            BookingEvent::CancellationRequested(data) => {
                self.cancellation_requested = true;
                self.updated_at = Some(data.requested_at);
            }
            BookingEvent::BookingCancelled(data) => {
                self.cancellation_requested = false;
                self.status = BookingStatus::Cancelled;
                self.updated_at = Some(data.cancelled_at);
            }
            BookingEvent::CancellationFailed(data) => {
                self.cancellation_requested = false;
                self.updated_at = Some(data.failed_at);
            }
        }
    }
}

// Query methods
impl BookingDraft {
    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn is_reserved(&self) -> bool {
        self.booking_ref.is_some()
    }

    pub fn financials(&self) -> &Financials {
        &self.financials
    }

    pub fn travellers(&self) -> &[Traveller] {
        &self.travellers
    }

    pub fn hotel(&self) -> Option<&HotelSnapshot> {
        self.hotel.as_ref()
    }

    pub fn quote(&self) -> Option<&SupplierQuote> {
        self.quote.as_ref()
    }

    pub fn stay(&self) -> Option<&Stay> {
        self.stay.as_ref()
    }

    pub fn payment_gateway(&self) -> Option<&str> {
        self.payment_gateway.as_deref()
    }

    pub fn payment_intent_id(&self) -> Option<&str> {
        self.payment_intent_id.as_deref()
    }

    pub fn payer(&self) -> Option<&Payer> {
        self.payer.as_ref()
    }

    pub fn cancellation_requested(&self) -> bool {
        self.cancellation_requested
    }

    pub fn cancellation_allowed(&self) -> bool {
        self.quote.as_ref().is_some_and(|q| q.cancellation_allowed)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

// Command methods (return events)
impl BookingDraft {
    /// Reserves the reference. Re-reserving an existing draft is a no-op.
    pub fn reserve(&self, payload: &DraftPayload) -> Result<Vec<BookingEvent>, BookingError> {
        if self.is_reserved() {
            return Ok(vec![]);
        }

        payload.validate()?;

        let financials =
            Financials::from_quote(&payload.quote, payload.stay.nights(), Money::zero())?;

        Ok(vec![BookingEvent::DraftReserved(DraftReservedData {
            booking_ref: payload.booking_ref.clone(),
            quote: payload.quote.clone(),
            hotel: HotelSnapshot::from(&payload.quote),
            stay: payload.stay.clone(),
            travellers: payload.travellers.clone(),
            financials,
            payer: payload.payer.clone(),
            payment_gateway: payload.payment_gateway.clone(),
            reserved_at: Utc::now(),
        })])
    }

    /// Replaces the room snapshot and totals. Only before payment.
    pub fn recompute_financials(
        &self,
        quote: SupplierQuote,
        agent_fee: Money,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        let stay = self.require_stay()?;

        if self.status == BookingStatus::Paid {
            return Err(BookingError::FinancialsImmutable);
        }
        if !self.status.can_recompute() {
            return Err(self.invalid_transition("recompute financials"));
        }
        if self
            .quote
            .as_ref()
            .is_some_and(|current| current.hotel_id != quote.hotel_id)
        {
            return Err(BookingError::InvalidPayload(
                "recomputed quote is for a different hotel".to_string(),
            ));
        }

        let financials = Financials::from_quote(&quote, stay.nights(), agent_fee)?;
        if self.quote.as_ref() == Some(&quote) && self.financials == financials {
            return Ok(vec![]);
        }

        Ok(vec![BookingEvent::financials_recomputed(quote, financials)])
    }

    /// Applies a finalize-phase payload: `unpaid` persists details, `paid`
    /// finalizes the booking.
    pub fn apply_finalize(
        &self,
        payload: &FinalizePayload,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        match payload.status {
            FinalizeStatus::Unpaid => self.persist_details(payload),
            FinalizeStatus::Paid => self.finalize(payload),
        }
    }

    /// Stores traveller and payment details while the charge is outstanding.
    pub fn persist_details(
        &self,
        payload: &FinalizePayload,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        self.require_stay()?;
        payload.validate()?;

        if !self.status.can_persist_details() {
            return Err(self.invalid_transition("persist details"));
        }

        let travellers = self.resolve_travellers(payload)?;
        let payment_intent_id = payload
            .payment_intent_id
            .clone()
            .or_else(|| self.payment_intent_id.clone());

        if self.status == BookingStatus::Unpaid
            && travellers == self.travellers
            && self.payment_gateway.as_deref() == Some(payload.payment_gateway.as_str())
            && payment_intent_id == self.payment_intent_id
        {
            return Ok(vec![]);
        }

        Ok(vec![BookingEvent::details_persisted(
            travellers,
            payload.payment_gateway.clone(),
            payment_intent_id,
        )])
    }

    /// Marks the booking paid. Finalizing again with the same intent is a
    /// no-op; a different intent is rejected.
    pub fn finalize(&self, payload: &FinalizePayload) -> Result<Vec<BookingEvent>, BookingError> {
        self.require_stay()?;
        payload.validate()?;

        let payment_intent_id = payload
            .payment_intent_id
            .clone()
            .ok_or_else(|| BookingError::InvalidPayload("missing payment intent id".to_string()))?;

        if self.status == BookingStatus::Paid {
            if self.payment_intent_id.as_deref() == Some(payment_intent_id.as_str()) {
                return Ok(vec![]);
            }
            return Err(BookingError::AlreadyPaid);
        }
        if !self.status.can_finalize() {
            return Err(self.invalid_transition("finalize"));
        }

        let travellers = self.resolve_travellers(payload)?;

        Ok(vec![BookingEvent::booking_finalized(
            payment_intent_id,
            payload.payment_gateway.clone(),
            travellers,
            self.financials.charge_amount(),
        )])
    }

    /// Flags a cancellation as in flight. Rejected without events when the
    /// room is non-refundable, the booking isn't confirmed, or a request is
    /// already pending.
    pub fn request_cancellation(
        &self,
        reason: Option<String>,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        if !self.is_reserved() {
            return Err(BookingError::NotReserved);
        }
        if !self.cancellation_allowed() {
            return Err(BookingError::CancellationNotAllowed(
                "the selected room does not allow cancellation".to_string(),
            ));
        }
        if !self.status.is_confirmed() {
            return Err(BookingError::CancellationNotAllowed(format!(
                "booking is {}",
                self.status
            )));
        }
        if self.cancellation_requested {
            return Err(BookingError::CancellationInFlight);
        }

        Ok(vec![BookingEvent::cancellation_requested(reason)])
    }

    pub fn complete_cancellation(
        &self,
        message: impl Into<String>,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        if !self.cancellation_requested {
            return Err(BookingError::NoCancellationInFlight);
        }
        Ok(vec![BookingEvent::booking_cancelled(message)])
    }

    pub fn fail_cancellation(
        &self,
        message: impl Into<String>,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        if !self.cancellation_requested {
            return Err(BookingError::NoCancellationInFlight);
        }
        Ok(vec![BookingEvent::cancellation_failed(message)])
    }

    fn require_stay(&self) -> Result<&Stay, BookingError> {
        self.stay.as_ref().ok_or(BookingError::NotReserved)
    }

    fn invalid_transition(&self, action: &'static str) -> BookingError {
        BookingError::InvalidStateTransition {
            current_state: self.status,
            action,
        }
    }

    fn resolve_travellers(&self, payload: &FinalizePayload) -> Result<Vec<Traveller>, BookingError> {
        if payload.travellers.is_empty() {
            return Ok(self.travellers.clone());
        }
        validate_travellers(self.require_stay()?, &payload.travellers)?;
        Ok(payload.travellers.clone())
    }
}

// Apply helpers
impl BookingDraft {
    fn apply_draft_reserved(&mut self, data: DraftReservedData) {
        self.booking_ref = Some(data.booking_ref);
        self.status = BookingStatus::Pending;
        self.financials = data.financials;
        self.travellers = data.travellers;
        self.hotel = Some(data.hotel);
        self.quote = Some(data.quote);
        self.stay = Some(data.stay);
        self.payer = Some(data.payer);
        self.payment_gateway = Some(data.payment_gateway);
        self.created_at = Some(data.reserved_at);
        self.updated_at = Some(data.reserved_at);
    }
}

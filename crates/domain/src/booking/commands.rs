//! Booking commands.

use common::{BookingRef, Money};
use search::SupplierQuote;

use crate::command::Command;

use super::{BookingDraft, CancelRequest, DraftPayload, FinalizePayload};

/// Command to reserve a booking reference with a provisional draft.
#[derive(Debug, Clone)]
pub struct ReserveDraft {
    pub payload: DraftPayload,
}

impl ReserveDraft {
    pub fn new(payload: DraftPayload) -> Self {
        Self { payload }
    }
}

impl Command for ReserveDraft {
    type Aggregate = BookingDraft;

    fn booking_ref(&self) -> &BookingRef {
        &self.payload.booking_ref
    }
}

/// Command to replace the draft's quote snapshot with a recomputed one.
#[derive(Debug, Clone)]
pub struct RecomputeFinancials {
    pub booking_ref: BookingRef,
    pub quote: SupplierQuote,
    pub agent_fee: Money,
}

impl RecomputeFinancials {
    pub fn new(booking_ref: BookingRef, quote: SupplierQuote, agent_fee: Money) -> Self {
        Self {
            booking_ref,
            quote,
            agent_fee,
        }
    }
}

impl Command for RecomputeFinancials {
    type Aggregate = BookingDraft;

    fn booking_ref(&self) -> &BookingRef {
        &self.booking_ref
    }
}

/// Command carrying a finalize-phase payload (`unpaid` or `paid`).
#[derive(Debug, Clone)]
pub struct PersistFinalize {
    pub payload: FinalizePayload,
}

impl PersistFinalize {
    pub fn new(payload: FinalizePayload) -> Self {
        Self { payload }
    }
}

impl Command for PersistFinalize {
    type Aggregate = BookingDraft;

    fn booking_ref(&self) -> &BookingRef {
        &self.payload.booking_ref
    }
}

#[derive(Debug, Clone)]
pub struct RequestCancellation {
    pub request: CancelRequest,
}

impl RequestCancellation {
    pub fn new(request: CancelRequest) -> Self {
        Self { request }
    }
}

impl Command for RequestCancellation {
    type Aggregate = BookingDraft;

    fn booking_ref(&self) -> &BookingRef {
        &self.request.booking_ref
    }
}

/// Command to record a confirmed cancellation.
#[derive(Debug, Clone)]
pub struct CompleteCancellation {
    pub booking_ref: BookingRef,
    pub message: String,
}

impl CompleteCancellation {
    pub fn new(booking_ref: BookingRef, message: impl Into<String>) -> Self {
        Self {
            booking_ref,
            message: message.into(),
        }
    }
}

impl Command for CompleteCancellation {
    type Aggregate = BookingDraft;

    fn booking_ref(&self) -> &BookingRef {
        &self.booking_ref
    }
}

/// Command to record a cancellation the cancellation API refused.
#[derive(Debug, Clone)]
pub struct FailCancellation {
    pub booking_ref: BookingRef,
    pub message: String,
}

impl FailCancellation {
    pub fn new(booking_ref: BookingRef, message: impl Into<String>) -> Self {
        Self {
            booking_ref,
            message: message.into(),
        }
    }
}

impl Command for FailCancellation {
    type Aggregate = BookingDraft;

    fn booking_ref(&self) -> &BookingRef {
        &self.booking_ref
    }
}

//! Per-phase booking payloads, validated at the boundary.
//!
//! Each phase of a booking carries its own payload type, so a finalize
//! request can never smuggle in reservation fields (or financials).

use common::{BookingRef, Money};
use search::SupplierQuote;
use serde::{Deserialize, Serialize};

use super::{BookingError, Financials, Payer, Stay, Traveller, validate_travellers};

/// Any booking ledger write, tagged by phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BookingPayload {
    Draft(DraftPayload),
    Finalize(FinalizePayload),
    Cancel(CancelRequest),
}

impl BookingPayload {
    pub fn booking_ref(&self) -> &BookingRef {
        match self {
            BookingPayload::Draft(p) => &p.booking_ref,
            BookingPayload::Finalize(p) => &p.booking_ref,
            BookingPayload::Cancel(p) => &p.booking_ref,
        }
    }

    pub fn phase(&self) -> &'static str {
        match self {
            BookingPayload::Draft(_) => "draft",
            BookingPayload::Finalize(_) => "finalize",
            BookingPayload::Cancel(_) => "cancel",
        }
    }
}

/// Provisional reservation of a booking reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPayload {
    pub booking_ref: BookingRef,
    /// The selected room, frozen as the room snapshot.
    pub quote: SupplierQuote,
    pub stay: Stay,
    pub travellers: Vec<Traveller>,
    pub payer: Payer,
    pub payment_gateway: String,
}

impl DraftPayload {
    pub fn validate(&self) -> Result<(), BookingError> {
        self.stay.validate()?;
        if self.quote.quantity == 0 {
            return Err(BookingError::InvalidPayload(
                "quote quantity must be at least 1".to_string(),
            ));
        }
        if self.quote.markup_price_per_night.minor() < 0 || self.quote.base_price_per_night.minor() < 0
        {
            return Err(BookingError::InvalidPayload(
                "quote prices must not be negative".to_string(),
            ));
        }
        Financials::from_quote(&self.quote, self.stay.nights(), Money::zero())?;
        validate_payer(&self.payer)?;
        if self.payment_gateway.trim().is_empty() {
            return Err(BookingError::InvalidPayload(
                "payment gateway is required".to_string(),
            ));
        }
        validate_travellers(&self.stay, &self.travellers)
    }
}

/// Status a finalize payload moves the booking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeStatus {
    /// Details persisted while the charge is outstanding.
    Unpaid,
    /// Authorization succeeded.
    Paid,
}

/// Traveller and payment details. Totals are never taken from here; they
/// come from the draft's own financials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizePayload {
    pub booking_ref: BookingRef,
    pub status: FinalizeStatus,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    pub payment_gateway: String,
    /// Empty keeps the travellers already on the draft.
    #[serde(default)]
    pub travellers: Vec<Traveller>,
}

impl FinalizePayload {
    pub fn unpaid(booking_ref: BookingRef, payment_gateway: impl Into<String>) -> Self {
        Self {
            booking_ref,
            status: FinalizeStatus::Unpaid,
            payment_intent_id: None,
            payment_gateway: payment_gateway.into(),
            travellers: Vec::new(),
        }
    }

    pub fn paid(
        booking_ref: BookingRef,
        payment_gateway: impl Into<String>,
        payment_intent_id: impl Into<String>,
    ) -> Self {
        Self {
            booking_ref,
            status: FinalizeStatus::Paid,
            payment_intent_id: Some(payment_intent_id.into()),
            payment_gateway: payment_gateway.into(),
            travellers: Vec::new(),
        }
    }

    pub fn with_intent(mut self, payment_intent_id: impl Into<String>) -> Self {
        self.payment_intent_id = Some(payment_intent_id.into());
        self
    }

    pub fn with_travellers(mut self, travellers: Vec<Traveller>) -> Self {
        self.travellers = travellers;
        self
    }

    /// Checks what can be checked without the draft. Traveller counts are
    /// checked against the draft's stay when applied.
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.payment_gateway.trim().is_empty() {
            return Err(BookingError::InvalidPayload(
                "payment gateway is required".to_string(),
            ));
        }
        if self.status == FinalizeStatus::Paid
            && self
                .payment_intent_id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty())
        {
            return Err(BookingError::InvalidPayload(
                "a paid booking needs a payment intent id".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub booking_ref: BookingRef,
    #[serde(default)]
    pub reason: Option<String>,
}

fn validate_payer(payer: &Payer) -> Result<(), BookingError> {
    let email = payer.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(BookingError::InvalidPayload(format!(
            "invalid payer email: {email:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::value_objects::fixtures;

    fn draft() -> DraftPayload {
        DraftPayload {
            booking_ref: BookingRef::parse("TT-1001").unwrap(),
            quote: fixtures::quote(),
            stay: fixtures::stay(),
            travellers: fixtures::travellers(),
            payer: Payer {
                email: "layla@example.com".to_string(),
                user_id: None,
            },
            payment_gateway: "stripe".to_string(),
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn draft_rejects_bad_email_and_party() {
        let mut bad_email = draft();
        bad_email.payer.email = "layla".to_string();
        assert!(matches!(
            bad_email.validate(),
            Err(BookingError::InvalidPayload(_))
        ));

        let mut short = draft();
        short.travellers.truncate(1);
        assert!(matches!(
            short.validate(),
            Err(BookingError::TravellerCount { .. })
        ));
    }

    #[test]
    fn paid_finalize_requires_intent() {
        let booking_ref = BookingRef::parse("TT-1001").unwrap();
        let mut payload = FinalizePayload::paid(booking_ref.clone(), "stripe", "pi_1");
        assert!(payload.validate().is_ok());

        payload.payment_intent_id = None;
        assert!(payload.validate().is_err());

        assert!(FinalizePayload::unpaid(booking_ref, "stripe").validate().is_ok());
    }

    #[test]
    fn payloads_are_tagged_by_phase() {
        let payload = BookingPayload::Cancel(CancelRequest {
            booking_ref: BookingRef::parse("TT-1001").unwrap(),
            reason: None,
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["phase"], "cancel");
        assert_eq!(json["booking_ref"], "TT-1001");

        let back: BookingPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn finalize_payload_cannot_carry_financials() {
        let json = serde_json::json!({
            "phase": "finalize",
            "booking_ref": "TT-1001",
            "status": "paid",
            "payment_intent_id": "pi_1",
            "payment_gateway": "stripe",
            "price_markup": 1
        });
        let payload: BookingPayload = serde_json::from_value(json).unwrap();
        // Unknown totals are ignored, never applied.
        assert_eq!(payload.phase(), "finalize");
    }
}

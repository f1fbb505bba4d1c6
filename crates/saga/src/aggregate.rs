//! Checkout saga aggregate.

use chrono::{DateTime, Utc};
use common::{BookingRef, Currency, Money};
use domain::Aggregate;
use ledger::Version;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;
use crate::events::CheckoutEvent;
use crate::state::SettlementState;

/// An event-sourced checkout saga, one per booking reference.
///
/// Tracks the reservation, the current payment attempt and whether the
/// booking was finalized or needs an operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSaga {
    booking_ref: Option<BookingRef>,
    version: Version,
    state: SettlementState,
    attempts: u32,
    amount: Option<Money>,
    currency: Option<Currency>,
    payment_intent_id: Option<String>,
    /// Set when the details write of the current attempt failed.
    details_failure: Option<String>,
    finalized: bool,
    reconciliation_required: bool,
    last_failure: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for CheckoutSaga {
    type Event = CheckoutEvent;
    type Error = SagaError;

    fn aggregate_type() -> &'static str {
        "CheckoutSaga"
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
            CheckoutEvent::ReservationConfirmed(data) => {
                self.booking_ref = Some(data.booking_ref);
                self.updated_at = Some(data.reserved_at);
            }
            CheckoutEvent::AttemptStarted(data) => {
                self.attempts = data.attempt;
                self.state = SettlementState::IntentRequested;
                self.amount = Some(data.amount);
                self.currency = Some(data.currency);
                self.payment_intent_id = None;
                self.details_failure = None;
                self.last_failure = None;
                self.updated_at = Some(data.started_at);
            }
            CheckoutEvent::IntentCreated(data) => {
                self.payment_intent_id = Some(data.payment_intent_id);
                self.state = SettlementState::IntentReady;
            }
            CheckoutEvent::IntentFailed(data) | CheckoutEvent::AuthorizationFailed(data) => {
                self.state = SettlementState::Error;
                self.updated_at = Some(data.at);
                self.last_failure = Some(data.message);
            }
            CheckoutEvent::DetailsPersistFailed(data) => {
                self.updated_at = Some(data.at);
                self.details_failure = Some(data.message);
            }
            CheckoutEvent::AuthorizationStarted(data) => {
                self.state = SettlementState::Authorizing;
                self.updated_at = Some(data.at);
            }
            CheckoutEvent::PaymentAuthorized(data) => {
                self.state = SettlementState::Authorized;
                self.payment_intent_id = Some(data.payment_intent_id);
                self.updated_at = Some(data.authorized_at);
            }
            CheckoutEvent::PaymentDeclined(data) => {
                self.state = SettlementState::Declined;
                self.updated_at = Some(data.at);
                self.last_failure = Some(data.message);
            }
            CheckoutEvent::AttemptAbandoned(data) => {
                self.state = SettlementState::Idle;
                self.updated_at = Some(data.at);
            }
            CheckoutEvent::BookingFinalized(data) => {
                self.finalized = true;
                self.reconciliation_required = false;
                self.updated_at = Some(data.finalized_at);
            }
            CheckoutEvent::ReconciliationRequired(data) => {
                self.reconciliation_required = true;
                self.updated_at = Some(data.at);
                self.last_failure = Some(data.reason);
            }
        }
    }
}

// Query methods
impl CheckoutSaga {
    pub fn state(&self) -> SettlementState {
        self.state
    }

    pub fn is_reserved(&self) -> bool {
        self.booking_ref.is_some()
    }

    /// Number of payment attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn amount(&self) -> Option<Money> {
        self.amount
    }

    pub fn currency(&self) -> Option<&Currency> {
        self.currency.as_ref()
    }

    pub fn payment_intent_id(&self) -> Option<&str> {
        self.payment_intent_id.as_deref()
    }

    pub fn details_failure(&self) -> Option<&str> {
        self.details_failure.as_deref()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn reconciliation_required(&self) -> bool {
        self.reconciliation_required
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserved() -> CheckoutSaga {
        let mut saga = CheckoutSaga::default();
        saga.apply(CheckoutEvent::reservation_confirmed(
            BookingRef::parse("TT-1001").unwrap(),
        ));
        saga
    }

    fn start_attempt(saga: &mut CheckoutSaga) {
        let attempt = saga.attempts() + 1;
        saga.apply(CheckoutEvent::attempt_started(
            attempt,
            Money::from_minor(138_000),
            Currency::parse("AED").unwrap(),
        ));
    }

    #[test]
    fn test_default_saga() {
        let saga = CheckoutSaga::default();
        assert!(!saga.is_reserved());
        assert_eq!(saga.state(), SettlementState::Idle);
        assert_eq!(saga.attempts(), 0);
    }

    #[test]
    fn test_happy_path_lifecycle() {
        let mut saga = reserved();
        start_attempt(&mut saga);
        assert_eq!(saga.state(), SettlementState::IntentRequested);

        saga.apply_events(vec![
            CheckoutEvent::intent_created(1, "pi_1"),
            CheckoutEvent::authorization_started(1),
            CheckoutEvent::payment_authorized(1, "pi_1"),
            CheckoutEvent::booking_finalized("pi_1", false),
        ]);

        assert_eq!(saga.state(), SettlementState::Authorized);
        assert_eq!(saga.payment_intent_id(), Some("pi_1"));
        assert!(saga.is_finalized());
        assert!(!saga.reconciliation_required());
    }

    #[test]
    fn test_declined_allows_new_attempt() {
        let mut saga = reserved();
        start_attempt(&mut saga);
        saga.apply_events(vec![
            CheckoutEvent::intent_created(1, "pi_1"),
            CheckoutEvent::authorization_started(1),
            CheckoutEvent::payment_declined(1, "Your card was declined."),
        ]);

        assert_eq!(saga.state(), SettlementState::Declined);
        assert_eq!(saga.last_failure(), Some("Your card was declined."));
        assert!(saga.state().can_start_attempt());

        start_attempt(&mut saga);
        assert_eq!(saga.attempts(), 2);
        assert_eq!(saga.last_failure(), None);
        assert_eq!(saga.payment_intent_id(), None);
    }

    #[test]
    fn test_abandon_returns_to_idle() {
        let mut saga = reserved();
        start_attempt(&mut saga);
        saga.apply_events(vec![
            CheckoutEvent::intent_created(1, "pi_1"),
            CheckoutEvent::authorization_started(1),
            CheckoutEvent::attempt_abandoned(1),
        ]);
        assert_eq!(saga.state(), SettlementState::Idle);
    }

    #[test]
    fn test_reconciliation_flag_cleared_by_finalization() {
        let mut saga = reserved();
        start_attempt(&mut saga);
        saga.apply_events(vec![
            CheckoutEvent::intent_created(1, "pi_1"),
            CheckoutEvent::details_persist_failed(1, "ledger unavailable"),
            CheckoutEvent::authorization_started(1),
            CheckoutEvent::payment_authorized(1, "pi_1"),
            CheckoutEvent::reconciliation_required("pi_1", "ledger unavailable"),
        ]);
        assert!(saga.reconciliation_required());
        assert_eq!(saga.details_failure(), Some("ledger unavailable"));

        saga.apply(CheckoutEvent::booking_finalized("pi_1", true));
        assert!(!saga.reconciliation_required());
        assert!(saga.is_finalized());
    }
}

//! Server-owned checkout saga for hotel bookings.
//!
//! One saga per booking reference carries a booking through:
//! 1. Reservation of the reference with a pending draft
//! 2. Optional agent repricing before payment
//! 3. Payment settlement: intent creation, then card authorization
//! 4. Finalization of the paid booking
//!
//! Confirmed bookings can later be cancelled. A card that was charged is
//! never charged again: if the booking cannot be finalized the saga is
//! flagged for operator reconciliation and the client still lands on the
//! success page.

pub mod aggregate;
pub mod caller;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod handoff;
pub mod outcome;
pub mod services;
pub mod state;

pub use aggregate::CheckoutSaga;
pub use caller::{Caller, CallerRole};
pub use config::CheckoutConfig;
pub use coordinator::{CheckoutCoordinator, CheckoutServices, RecomputeRequest, SettleRequest};
pub use error::SagaError;
pub use events::CheckoutEvent;
pub use handoff::{HandoffSigner, HandoffToken};
pub use outcome::{CancellationResult, CheckoutOutcome, ReserveReceipt};
pub use services::{
    AgentCommissionService, BillingDetails, CancellationResponse, CancellationService,
    CardDetails, ConfirmBehavior, ConfirmRequest, FinancialService, GatewayError,
    InMemoryCancellationService, InMemoryPaymentGateway, IntentRequest, PaymentGateway,
    PaymentIntent, PaymentIntentStatus, RecomputedQuote,
};
pub use state::SettlementState;

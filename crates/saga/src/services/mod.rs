//! External service traits and in-memory implementations for checkout steps.

pub mod cancellation;
pub mod financial;
pub mod payment;

pub use cancellation::{CancellationResponse, CancellationService, InMemoryCancellationService};
pub use financial::{AgentCommissionService, FinancialService, RecomputedQuote};
pub use payment::{
    BillingDetails, CardDetails, ConfirmBehavior, ConfirmRequest, GatewayError,
    InMemoryPaymentGateway, IntentRequest, PaymentGateway, PaymentIntent, PaymentIntentStatus,
};

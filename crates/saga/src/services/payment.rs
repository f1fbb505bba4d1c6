//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{BookingRef, Currency, Money};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error object returned by the gateway. The message is shown to the user
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct GatewayError {
    pub message: String,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentIntentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentIntentStatus::RequiresAction => "requires_action",
            PaymentIntentStatus::Processing => "processing",
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent request. `amount` is in minor units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentRequest {
    pub amount: Money,
    pub currency: Currency,
    pub email: String,
    pub booking_ref: BookingRef,
}

/// A payment authorization as returned by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub payment_intent_id: String,
    /// Missing secrets are a hard failure for the attempt.
    pub client_secret: Option<String>,
    pub amount: Money,
    pub currency: Currency,
    pub status: PaymentIntentStatus,
}

/// Tokenized card as collected by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BillingDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmRequest {
    pub client_secret: String,
    pub card: CardDetails,
    pub billing_details: BillingDetails,
}

/// Trait for payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for the amount.
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, GatewayError>;

    /// Confirms a card payment. May not return for a long time (3-D Secure).
    async fn confirm_card_payment(
        &self,
        request: &ConfirmRequest,
    ) -> Result<PaymentIntentStatus, GatewayError>;
}

/// How the in-memory gateway answers `confirm_card_payment`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmBehavior {
    Succeed,
    /// Returns an error object with this message.
    Decline(String),
    /// Returns a non-success status.
    Status(PaymentIntentStatus),
    /// Never returns, like an unanswered 3-D Secure challenge.
    Hang,
}

#[derive(Debug)]
struct InMemoryGatewayState {
    intents: HashMap<String, PaymentIntent>,
    next_id: u32,
    fail_on_create: Option<String>,
    omit_client_secret: bool,
    confirm: ConfirmBehavior,
    confirm_delay: Option<Duration>,
    create_calls: usize,
    confirm_calls: usize,
    charged: Vec<(String, Money)>,
}

impl Default for InMemoryGatewayState {
    fn default() -> Self {
        Self {
            intents: HashMap::new(),
            next_id: 0,
            fail_on_create: None,
            omit_client_secret: false,
            confirm: ConfirmBehavior::Succeed,
            confirm_delay: None,
            create_calls: 0,
            confirm_calls: 0,
            charged: Vec::new(),
        }
    }
}

/// In-memory payment gateway for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes intent creation fail with the given message.
    pub fn set_fail_on_create(&self, message: Option<&str>) {
        self.write().fail_on_create = message.map(str::to_string);
    }

    /// Returns intents without a client secret.
    pub fn set_omit_client_secret(&self, omit: bool) {
        self.write().omit_client_secret = omit;
    }

    pub fn set_confirm_behavior(&self, behavior: ConfirmBehavior) {
        self.write().confirm = behavior;
    }

    pub fn set_confirm_delay(&self, delay: Option<Duration>) {
        self.write().confirm_delay = delay;
    }

    pub fn create_calls(&self) -> usize {
        self.read().create_calls
    }

    pub fn confirm_calls(&self) -> usize {
        self.read().confirm_calls
    }

    /// Intent ids and amounts that were successfully charged.
    pub fn charges(&self) -> Vec<(String, Money)> {
        self.read().charged.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryGatewayState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryGatewayState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, GatewayError> {
        let mut state = self.write();
        state.create_calls += 1;

        if let Some(message) = &state.fail_on_create {
            return Err(GatewayError::new(message.clone()));
        }

        state.next_id += 1;
        let payment_intent_id = format!("pi_{:06}", state.next_id);
        let intent = PaymentIntent {
            payment_intent_id: payment_intent_id.clone(),
            client_secret: (!state.omit_client_secret)
                .then(|| format!("{payment_intent_id}_secret_{}", request.booking_ref)),
            amount: request.amount,
            currency: request.currency.clone(),
            status: PaymentIntentStatus::RequiresPaymentMethod,
        };
        state.intents.insert(payment_intent_id, intent.clone());

        Ok(intent)
    }

    async fn confirm_card_payment(
        &self,
        request: &ConfirmRequest,
    ) -> Result<PaymentIntentStatus, GatewayError> {
        let (behavior, delay) = {
            let mut state = self.write();
            state.confirm_calls += 1;
            (state.confirm.clone(), state.confirm_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let status = match behavior {
            ConfirmBehavior::Succeed => PaymentIntentStatus::Succeeded,
            ConfirmBehavior::Decline(message) => return Err(GatewayError::new(message)),
            ConfirmBehavior::Status(status) => status,
            ConfirmBehavior::Hang => std::future::pending().await,
        };

        let mut state = self.write();
        let intent = state
            .intents
            .values_mut()
            .find(|i| i.client_secret.as_deref() == Some(request.client_secret.as_str()))
            .ok_or_else(|| GatewayError::new("No such payment intent"))?;
        intent.status = status;

        if status == PaymentIntentStatus::Succeeded {
            let charge = (intent.payment_intent_id.clone(), intent.amount);
            state.charged.push(charge);
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> IntentRequest {
        IntentRequest {
            amount: Money::from_minor(138_000),
            currency: Currency::parse("AED").unwrap(),
            email: "layla@example.com".to_string(),
            booking_ref: BookingRef::parse("TT-1001").unwrap(),
        }
    }

    fn confirm(intent: &PaymentIntent) -> ConfirmRequest {
        ConfirmRequest {
            client_secret: intent.client_secret.clone().unwrap(),
            card: CardDetails {
                token: "tok_visa".to_string(),
            },
            billing_details: BillingDetails::default(),
        }
    }

    #[tokio::test]
    async fn test_create_and_confirm() {
        let gateway = InMemoryPaymentGateway::new();

        let intent = gateway.create_intent(&request()).await.unwrap();
        assert_eq!(intent.payment_intent_id, "pi_000001");
        assert!(intent.client_secret.is_some());

        let status = gateway.confirm_card_payment(&confirm(&intent)).await.unwrap();
        assert_eq!(status, PaymentIntentStatus::Succeeded);
        assert_eq!(
            gateway.charges(),
            vec![("pi_000001".to_string(), Money::from_minor(138_000))]
        );
    }

    #[tokio::test]
    async fn test_decline_returns_message_and_charges_nothing() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_confirm_behavior(ConfirmBehavior::Decline("Your card was declined.".into()));

        let intent = gateway.create_intent(&request()).await.unwrap();
        let err = gateway
            .confirm_card_payment(&confirm(&intent))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Your card was declined.");
        assert!(gateway.charges().is_empty());
    }

    #[tokio::test]
    async fn test_missing_client_secret() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_omit_client_secret(true);

        let intent = gateway.create_intent(&request()).await.unwrap();
        assert!(intent.client_secret.is_none());
        assert_eq!(gateway.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_create() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_create(Some("gateway unavailable"));

        let err = gateway.create_intent(&request()).await.unwrap_err();
        assert_eq!(err.message, "gateway unavailable");
    }
}

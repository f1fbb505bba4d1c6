//! Checkout saga settings.

use std::time::Duration;

/// Knobs for the checkout coordinator.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Upper bound on a card confirmation, including any 3-D Secure challenge.
    pub authorization_timeout: Duration,
    /// Page the client is sent to after a successful payment.
    pub success_url_base: String,
    pub invoice_url_base: String,
    /// Gateway name recorded on the booking when the draft didn't name one.
    pub payment_gateway: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            authorization_timeout: Duration::from_secs(600),
            success_url_base: "http://localhost:3000/checkout/success".to_string(),
            invoice_url_base: "http://localhost:3000/invoices".to_string(),
            payment_gateway: "stripe".to_string(),
        }
    }
}

impl CheckoutConfig {
    pub fn invoice_url(&self, booking_ref: &common::BookingRef) -> String {
        format!("{}/{}", self.invoice_url_base.trim_end_matches('/'), booking_ref)
    }

    pub fn success_redirect(&self, token: &str) -> String {
        format!("{}?token={}", self.success_url_base, token)
    }
}

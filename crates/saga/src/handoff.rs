//! Signed hand-off token passed to the success page.
//!
//! Format: `base64url(json) "." base64url(hmac_sha256(secret, base64url(json)))`,
//! both parts without padding.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use common::{BookingRef, Currency, Money};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::SagaError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffToken {
    pub booking_ref: BookingRef,
    pub price: Money,
    pub currency: Currency,
    pub invoice_url: String,
    pub user_id: Option<String>,
    pub client_email: String,
    pub issued_at: DateTime<Utc>,
}

/// Signs and verifies hand-off tokens with a shared secret.
#[derive(Clone)]
pub struct HandoffSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for HandoffSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffSigner").finish_non_exhaustive()
    }
}

impl HandoffSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn sign(&self, token: &HandoffToken) -> Result<String, SagaError> {
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(token)?);
        let mut mac = self.mac()?;
        mac.update(body.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{body}.{signature}"))
    }

    /// Checks the signature and decodes the token. The comparison is
    /// constant time.
    pub fn verify(&self, token: &str) -> Result<HandoffToken, SagaError> {
        let (body, signature) = token
            .split_once('.')
            .ok_or_else(|| SagaError::InvalidToken("malformed token".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SagaError::InvalidToken("malformed signature".to_string()))?;

        let mut mac = self.mac()?;
        mac.update(body.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SagaError::InvalidToken("signature mismatch".to_string()))?;

        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| SagaError::InvalidToken("malformed payload".to_string()))?;
        serde_json::from_slice(&json)
            .map_err(|e| SagaError::InvalidToken(format!("unreadable payload: {e}")))
    }

    fn mac(&self) -> Result<HmacSha256, SagaError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SagaError::InvalidToken(format!("bad signing key: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> HandoffToken {
        HandoffToken {
            booking_ref: BookingRef::parse("TT-1001").unwrap(),
            price: Money::from_minor(138_000),
            currency: Currency::parse("AED").unwrap(),
            invoice_url: "https://example.com/invoices/TT-1001".to_string(),
            user_id: Some("u-42".to_string()),
            client_email: "layla@example.com".to_string(),
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let signer = HandoffSigner::new("s3cret");
        let token = token();
        let signed = signer.sign(&token).unwrap();

        assert_eq!(signed.matches('.').count(), 1);
        assert_eq!(signer.verify(&signed).unwrap(), token);
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let signer = HandoffSigner::new("s3cret");
        let signed = signer.sign(&token()).unwrap();
        let (_, signature) = signed.split_once('.').unwrap();

        let mut forged = token();
        forged.price = Money::from_minor(1);
        let forged_body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());

        let result = signer.verify(&format!("{forged_body}.{signature}"));
        assert!(matches!(result, Err(SagaError::InvalidToken(_))));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let signed = HandoffSigner::new("a").sign(&token()).unwrap();
        assert!(HandoffSigner::new("b").verify(&signed).is_err());
    }

    #[test]
    fn test_malformed_tokens() {
        let signer = HandoffSigner::new("s3cret");
        assert!(signer.verify("no-dot").is_err());
        assert!(signer.verify("abc.!!!").is_err());
        assert!(signer.verify("").is_err());
    }
}

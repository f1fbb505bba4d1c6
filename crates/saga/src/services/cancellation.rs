//! Cancellation API trait and in-memory implementation.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::BookingRef;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// Answer from the cancellation API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationResponse {
    pub cancelled: bool,
    pub message: String,
}

/// Trait for the supplier-side cancellation API.
#[async_trait]
pub trait CancellationService: Send + Sync {
    async fn cancel_booking(&self, booking_ref: &BookingRef)
    -> Result<CancellationResponse, SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryCancellationState {
    cancelled: HashSet<BookingRef>,
    fail_on_cancel: bool,
    refuse_with: Option<String>,
    calls: usize,
}

/// In-memory cancellation API for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCancellationService {
    state: Arc<RwLock<InMemoryCancellationState>>,
}

impl InMemoryCancellationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next calls fail with a transport-style error.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_cancel = fail;
    }

    /// Makes the API answer "not cancelled" with the given message.
    pub fn set_refuse_with(&self, message: Option<&str>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .refuse_with = message.map(str::to_string);
    }

    pub fn call_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
    }

    pub fn is_cancelled(&self, booking_ref: &BookingRef) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cancelled
            .contains(booking_ref)
    }
}

#[async_trait]
impl CancellationService for InMemoryCancellationService {
    async fn cancel_booking(
        &self,
        booking_ref: &BookingRef,
    ) -> Result<CancellationResponse, SagaError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.calls += 1;

        if state.fail_on_cancel {
            return Err(SagaError::CancellationFailed {
                booking_ref: booking_ref.clone(),
                message: "cancellation service unavailable".to_string(),
            });
        }
        if let Some(message) = &state.refuse_with {
            return Ok(CancellationResponse {
                cancelled: false,
                message: message.clone(),
            });
        }

        state.cancelled.insert(booking_ref.clone());
        Ok(CancellationResponse {
            cancelled: true,
            message: format!("Booking {booking_ref} cancelled"),
        })
    }
}

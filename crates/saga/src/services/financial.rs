//! Agent financial recalculation.

use async_trait::async_trait;
use chrono::NaiveDate;
use common::Money;
use search::SupplierQuote;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// A quote priced for an agent, with the agent's fee for the whole stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputedQuote {
    pub quote: SupplierQuote,
    pub agent_fee: Money,
}

/// Recomputes a quote's totals. Idempotent for the same inputs.
#[async_trait]
pub trait FinancialService: Send + Sync {
    async fn recompute(
        &self,
        room_count: u32,
        checkin: NaiveDate,
        checkout: NaiveDate,
        quote: &SupplierQuote,
    ) -> Result<RecomputedQuote, SagaError>;
}

/// Applies a fixed agent commission, in basis points, to the stay's markup
/// total.
#[derive(Debug, Clone, Copy)]
pub struct AgentCommissionService {
    commission_bps: u32,
}

impl AgentCommissionService {
    pub fn new(commission_bps: u32) -> Self {
        Self { commission_bps }
    }

    pub fn commission_bps(&self) -> u32 {
        self.commission_bps
    }
}

#[async_trait]
impl FinancialService for AgentCommissionService {
    async fn recompute(
        &self,
        room_count: u32,
        checkin: NaiveDate,
        checkout: NaiveDate,
        quote: &SupplierQuote,
    ) -> Result<RecomputedQuote, SagaError> {
        let nights = (checkout - checkin).num_days();
        if nights <= 0 {
            return Err(SagaError::FinancialService(
                "checkout must be after checkin".to_string(),
            ));
        }
        if room_count == 0 {
            return Err(SagaError::FinancialService(
                "at least one room is required".to_string(),
            ));
        }

        let mut quote = quote.clone();
        quote.quantity = room_count;

        let nights = u32::try_from(nights)
            .map_err(|_| SagaError::FinancialService("stay is too long".to_string()))?;
        let markup_total = quote
            .markup_price_per_night
            .checked_multiply(nights)
            .and_then(|total| total.checked_multiply(room_count))
            .ok_or_else(|| SagaError::FinancialService("price total out of range".to_string()))?;

        Ok(RecomputedQuote {
            agent_fee: markup_total.apply_bps(self.commission_bps),
            quote,
        })
    }
}

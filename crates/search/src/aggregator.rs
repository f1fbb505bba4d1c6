//! Concurrent, fail-soft fan-out across suppliers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{SearchContext, SupplierClient, SupplierQuote, SupplierSearchRequest};

/// How one supplier fared in a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SupplierStatus {
    /// Number of quotes returned before filtering.
    Ok(usize),
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierOutcome {
    pub supplier_id: String,
    #[serde(flatten)]
    pub status: SupplierStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateResult {
    pub quotes: Vec<SupplierQuote>,
    pub suppliers: Vec<SupplierOutcome>,
}

/// Fans a search out to every supplier and merges what comes back.
pub struct QuoteAggregator {
    suppliers: Vec<Arc<dyn SupplierClient>>,
    supplier_timeout: Duration,
}

impl QuoteAggregator {
    pub fn new(suppliers: Vec<Arc<dyn SupplierClient>>, supplier_timeout: Duration) -> Self {
        Self {
            suppliers,
            supplier_timeout,
        }
    }

    pub fn supplier_ids(&self) -> Vec<String> {
        self.suppliers
            .iter()
            .map(|s| s.supplier_id().to_string())
            .collect()
    }

    /// Queries all suppliers concurrently.
    ///
    /// Never fails: a supplier that errors, times out or panics contributes
    /// zero quotes. Quotes keep supplier registration order, then the order
    /// each supplier returned them in, and are deduplicated by
    /// `(hotel_id, supplier_id)` keeping the first occurrence.
    #[tracing::instrument(skip(self, context), fields(destination = %context.destination, page = context.page))]
    pub async fn search(&self, context: &SearchContext) -> AggregateResult {
        let started = Instant::now();
        let request = SupplierSearchRequest::from(context);

        info!(
            "Fetching quotes for {} from {} suppliers",
            context.destination,
            self.suppliers.len()
        );

        let tasks = self.suppliers.iter().map(|supplier| {
            let supplier = Arc::clone(supplier);
            let request = request.clone();
            let limit = self.supplier_timeout;

            tokio::spawn(async move {
                debug!("Starting quote fetch from supplier {}", supplier.supplier_id());
                timeout(limit, supplier.search(&request)).await
            })
        });

        let results = join_all(tasks).await;

        let mut quotes = Vec::new();
        let mut outcomes = Vec::with_capacity(self.suppliers.len());

        for (supplier, joined) in self.suppliers.iter().zip(results) {
            let supplier_id = supplier.supplier_id().to_string();
            let status = match joined {
                Ok(Ok(Ok(found))) => {
                    let count = found.len();
                    quotes.extend(found);
                    SupplierStatus::Ok(count)
                }
                Ok(Ok(Err(e))) => {
                    warn!("Supplier {} returned error: {}", supplier_id, e);
                    SupplierStatus::Failed(e.to_string())
                }
                Ok(Err(_)) => {
                    warn!(
                        "Supplier {} timed out after {}ms",
                        supplier_id,
                        self.supplier_timeout.as_millis()
                    );
                    SupplierStatus::TimedOut
                }
                Err(e) => {
                    warn!("Supplier {} task failed: {}", supplier_id, e);
                    SupplierStatus::Failed("supplier task aborted".to_string())
                }
            };

            let label = match status {
                SupplierStatus::Ok(_) => "ok",
                SupplierStatus::Failed(_) => "failed",
                SupplierStatus::TimedOut => "timeout",
            };
            metrics::counter!("supplier_requests_total", "supplier" => supplier_id.clone(), "outcome" => label)
                .increment(1);
            if label != "ok" {
                metrics::counter!("supplier_failures_total", "supplier" => supplier_id.clone())
                    .increment(1);
            }

            outcomes.push(SupplierOutcome {
                supplier_id,
                status,
            });
        }

        let quotes: Vec<SupplierQuote> = dedup_quotes(quotes)
            .into_iter()
            .filter(|q| context.accepts(q))
            .collect();

        metrics::histogram!("search_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(
            "Quote aggregation completed: {} quotes from {} suppliers",
            quotes.len(),
            self.suppliers.len()
        );

        AggregateResult {
            quotes,
            suppliers: outcomes,
        }
    }
}

/// Drops later quotes that repeat a `(hotel_id, supplier_id)` pair.
pub fn dedup_quotes(quotes: Vec<SupplierQuote>) -> Vec<SupplierQuote> {
    let mut seen = HashSet::new();
    quotes
        .into_iter()
        .filter(|q| seen.insert(q.dedup_key()))
        .collect()
}

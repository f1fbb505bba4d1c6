//! Idempotency keys for side-effecting checkout steps.
//!
//! A caller claims a key before doing the work. A second caller with the same
//! key either sees the stored response of a finished attempt or learns that
//! an attempt is still in flight. In-flight claims older than the TTL are
//! treated as abandoned and can be taken over.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::Result;

/// Default lifetime of an in-flight claim, in seconds.
pub const DEFAULT_IN_FLIGHT_TTL_SECS: i64 = 300;

/// Outcome of trying to claim an idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// The caller owns the key and must `complete` or `release` it.
    Acquired,
    /// Another attempt holds the key.
    InFlight,
    /// A previous attempt finished; this is its stored response.
    Completed(serde_json::Value),
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn begin(&self, key: &str) -> Result<Claim>;

    /// Stores the response for a claimed key.
    async fn complete(&self, key: &str, response: serde_json::Value) -> Result<()>;

    /// Drops an in-flight claim so the operation can be retried.
    async fn release(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<T: IdempotencyStore + ?Sized> IdempotencyStore for Arc<T> {
    async fn begin(&self, key: &str) -> Result<Claim> {
        (**self).begin(key).await
    }

    async fn complete(&self, key: &str, response: serde_json::Value) -> Result<()> {
        (**self).complete(key, response).await
    }

    async fn release(&self, key: &str) -> Result<()> {
        (**self).release(key).await
    }
}

#[derive(Debug, Clone)]
enum Record {
    InFlight { since: DateTime<Utc> },
    Completed(serde_json::Value),
}

#[derive(Clone)]
pub struct InMemoryIdempotencyStore {
    records: Arc<Mutex<HashMap<String, Record>>>,
    in_flight_ttl: Duration,
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_IN_FLIGHT_TTL_SECS))
    }
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(in_flight_ttl: Duration) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            in_flight_ttl,
        }
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn begin(&self, key: &str) -> Result<Claim> {
        let mut records = self.records.lock().await;
        let now = Utc::now();

        match records.get(key) {
            Some(Record::Completed(response)) => return Ok(Claim::Completed(response.clone())),
            Some(Record::InFlight { since }) if now - *since < self.in_flight_ttl => {
                return Ok(Claim::InFlight);
            }
            Some(Record::InFlight { .. }) => {
                tracing::warn!(key, "taking over stale idempotency claim");
            }
            None => {}
        }

        records.insert(key.to_string(), Record::InFlight { since: now });
        Ok(Claim::Acquired)
    }

    async fn complete(&self, key: &str, response: serde_json::Value) -> Result<()> {
        self.records
            .lock()
            .await
            .insert(key.to_string(), Record::Completed(response));
        Ok(())
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut records = self.records.lock().await;
        if matches!(records.get(key), Some(Record::InFlight { .. })) {
            records.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn first_claim_acquires_second_sees_in_flight() {
        let store = InMemoryIdempotencyStore::new();
        assert_eq!(store.begin("reserve:TT-1").await.unwrap(), Claim::Acquired);
        assert_eq!(store.begin("reserve:TT-1").await.unwrap(), Claim::InFlight);
        assert_eq!(store.begin("reserve:TT-2").await.unwrap(), Claim::Acquired);
    }

    #[tokio::test]
    async fn completed_key_replays_response() {
        let store = InMemoryIdempotencyStore::new();
        store.begin("settle:TT-1").await.unwrap();
        store
            .complete("settle:TT-1", json!({"outcome": "confirmed"}))
            .await
            .unwrap();

        assert_eq!(
            store.begin("settle:TT-1").await.unwrap(),
            Claim::Completed(json!({"outcome": "confirmed"}))
        );
        // Release never discards a completed response.
        store.release("settle:TT-1").await.unwrap();
        assert!(matches!(
            store.begin("settle:TT-1").await.unwrap(),
            Claim::Completed(_)
        ));
    }

    #[tokio::test]
    async fn released_key_can_be_reclaimed() {
        let store = InMemoryIdempotencyStore::new();
        store.begin("reserve:TT-1").await.unwrap();
        store.release("reserve:TT-1").await.unwrap();
        assert_eq!(store.begin("reserve:TT-1").await.unwrap(), Claim::Acquired);
    }

    #[tokio::test]
    async fn stale_in_flight_claim_is_taken_over() {
        let store = InMemoryIdempotencyStore::with_ttl(Duration::zero());
        store.begin("reserve:TT-1").await.unwrap();
        assert_eq!(store.begin("reserve:TT-1").await.unwrap(), Claim::Acquired);
    }
}

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    EntryQuery, LedgerEntry, LedgerError, Result, StreamKey, Version,
    store::{AppendOptions, Ledger, validate_append},
};

/// In-memory ledger for tests and single-process deployments.
///
/// Behaves like the PostgreSQL ledger, plus fault injection hooks used to
/// exercise the checkout's persistence-failure paths.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
    faults: Arc<RwLock<Faults>>,
}

#[derive(Default)]
struct Faults {
    failing_stream_types: HashSet<String>,
    append_delay: Option<Duration>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Makes every append to streams of this type fail with `Unavailable`.
    pub async fn fail_appends_for(&self, stream_type: impl Into<String>, fail: bool) {
        let stream_type = stream_type.into();
        let mut faults = self.faults.write().await;
        if fail {
            faults.failing_stream_types.insert(stream_type);
        } else {
            faults.failing_stream_types.remove(&stream_type);
        }
    }

    /// Delays every append, to widen race windows in tests.
    pub async fn set_append_delay(&self, delay: Option<Duration>) {
        self.faults.write().await.append_delay = delay;
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn append(&self, entries: Vec<LedgerEntry>, options: AppendOptions) -> Result<Version> {
        validate_append(&entries)?;

        let (stream, first_version, last_version) = match (entries.first(), entries.last()) {
            (Some(first), Some(last)) => (first.stream_key(), first.version, last.version),
            _ => return Err(LedgerError::InvalidAppend("empty batch".to_string())),
        };

        let delay = {
            let faults = self.faults.read().await;
            if faults.failing_stream_types.contains(&stream.stream_type) {
                return Err(LedgerError::Unavailable(format!(
                    "appends to {} are failing",
                    stream.stream_type
                )));
            }
            faults.append_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut store = self.entries.write().await;

        let current_version = store
            .iter()
            .filter(|e| e.stream_type == stream.stream_type && e.booking_ref == stream.booking_ref)
            .map(|e| e.version)
            .max()
            .unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(LedgerError::ConcurrencyConflict {
                stream,
                expected,
                actual: current_version,
            });
        }

        // Mirrors the unique (stream_type, booking_ref, version) constraint.
        if first_version <= current_version {
            return Err(LedgerError::ConcurrencyConflict {
                stream,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }

        store.extend(entries);
        Ok(last_version)
    }

    async fn read_stream(&self, stream: &StreamKey) -> Result<Vec<LedgerEntry>> {
        let store = self.entries.read().await;
        let mut entries: Vec<_> = store
            .iter()
            .filter(|e| e.stream_type == stream.stream_type && e.booking_ref == stream.booking_ref)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.version);
        Ok(entries)
    }

    async fn query(&self, query: EntryQuery) -> Result<Vec<LedgerEntry>> {
        let store = self.entries.read().await;
        let mut entries: Vec<_> = store.iter().filter(|e| query.matches(e)).cloned().collect();

        entries.sort_by(|a, b| {
            a.recorded_at
                .cmp(&b.recorded_at)
                .then(a.version.cmp(&b.version))
        });

        let entries = entries.into_iter().skip(query.offset.unwrap_or(0));
        Ok(match query.limit {
            Some(limit) => entries.take(limit).collect(),
            None => entries.collect(),
        })
    }

    async fn stream_version(&self, stream: &StreamKey) -> Result<Option<Version>> {
        let store = self.entries.read().await;
        Ok(store
            .iter()
            .filter(|e| e.stream_type == stream.stream_type && e.booking_ref == stream.booking_ref)
            .map(|e| e.version)
            .max())
    }
}

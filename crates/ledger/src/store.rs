use async_trait::async_trait;

use crate::{EntryQuery, LedgerEntry, LedgerError, Result, StreamKey, Version};

/// Options for appending entries.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected stream version for optimistic concurrency control.
    /// If None, no version check is performed.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the stream to have no entries yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Core trait for ledger backends.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Appends entries to a single stream atomically.
    ///
    /// Fails with `ConcurrencyConflict` if `options.expected_version` is set
    /// and does not match the current stream version. Returns the new
    /// stream version.
    async fn append(&self, entries: Vec<LedgerEntry>, options: AppendOptions) -> Result<Version>;

    /// Reads every entry of a stream in version order.
    async fn read_stream(&self, stream: &StreamKey) -> Result<Vec<LedgerEntry>>;

    /// Reads entries matching a query, ordered by record time then version.
    async fn query(&self, query: EntryQuery) -> Result<Vec<LedgerEntry>>;

    /// Current version of a stream, or None if it has no entries.
    async fn stream_version(&self, stream: &StreamKey) -> Result<Option<Version>>;
}

/// Convenience methods available on every ledger.
#[async_trait]
pub trait LedgerExt: Ledger {
    async fn append_entry(&self, entry: LedgerEntry, options: AppendOptions) -> Result<Version> {
        self.append(vec![entry], options).await
    }

    async fn stream_exists(&self, stream: &StreamKey) -> Result<bool> {
        Ok(self.stream_version(stream).await?.is_some())
    }
}

impl<T: Ledger + ?Sized> LedgerExt for T {}

#[async_trait]
impl<T: Ledger + ?Sized> Ledger for std::sync::Arc<T> {
    async fn append(&self, entries: Vec<LedgerEntry>, options: AppendOptions) -> Result<Version> {
        (**self).append(entries, options).await
    }

    async fn read_stream(&self, stream: &StreamKey) -> Result<Vec<LedgerEntry>> {
        (**self).read_stream(stream).await
    }

    async fn query(&self, query: EntryQuery) -> Result<Vec<LedgerEntry>> {
        (**self).query(query).await
    }

    async fn stream_version(&self, stream: &StreamKey) -> Result<Option<Version>> {
        (**self).stream_version(stream).await
    }
}

/// Checks that a batch targets one stream with sequential versions.
pub fn validate_append(entries: &[LedgerEntry]) -> Result<()> {
    let Some(first) = entries.first() else {
        return Err(LedgerError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected_version = first.version;
    for entry in entries.iter().skip(1) {
        if entry.booking_ref != first.booking_ref || entry.stream_type != first.stream_type {
            return Err(LedgerError::InvalidAppend(
                "all entries must belong to the same stream".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if entry.version != expected_version {
            return Err(LedgerError::InvalidAppend(format!(
                "versions must be sequential: expected {}, got {}",
                expected_version, entry.version
            )));
        }
    }

    Ok(())
}

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::BookingRef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version of a stream, used for optimistic concurrency control.
///
/// A stream with no entries is at version 0; the first entry is version 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of a stream that has no entries yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Version of the first entry of a stream.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one stream in the ledger: a stream type plus the booking
/// reference it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    pub stream_type: String,
    pub booking_ref: BookingRef,
}

impl StreamKey {
    pub fn new(stream_type: impl Into<String>, booking_ref: BookingRef) -> Self {
        Self {
            stream_type: stream_type.into(),
            booking_ref,
        }
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.stream_type, self.booking_ref)
    }
}

/// A single recorded fact in a stream, with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,

    /// The type of the entry (e.g. "DraftReserved", "PaymentAuthorized").
    pub entry_type: String,

    /// The stream type this entry belongs to (e.g. "Booking").
    pub stream_type: String,

    /// The booking reference that keys the stream.
    pub booking_ref: BookingRef,

    /// The version of the stream after this entry.
    pub version: Version,

    pub recorded_at: DateTime<Utc>,

    /// The entry payload as JSON.
    pub payload: serde_json::Value,

    /// Correlation data such as the caller or attempt number.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LedgerEntry {
    pub fn builder() -> LedgerEntryBuilder {
        LedgerEntryBuilder::default()
    }

    pub fn stream_key(&self) -> StreamKey {
        StreamKey::new(self.stream_type.clone(), self.booking_ref.clone())
    }
}

/// Builder for ledger entries.
#[derive(Debug, Default)]
pub struct LedgerEntryBuilder {
    entry_id: Option<EntryId>,
    entry_type: Option<String>,
    stream: Option<StreamKey>,
    version: Option<Version>,
    recorded_at: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl LedgerEntryBuilder {
    pub fn entry_id(mut self, id: EntryId) -> Self {
        self.entry_id = Some(id);
        self
    }

    pub fn entry_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_type = Some(entry_type.into());
        self
    }

    pub fn stream(mut self, stream: StreamKey) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn recorded_at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(recorded_at);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the entry, returning `None` when the type, stream, version or
    /// payload is missing.
    pub fn build(self) -> Option<LedgerEntry> {
        let stream = self.stream?;
        Some(LedgerEntry {
            entry_id: self.entry_id.unwrap_or_default(),
            entry_type: self.entry_type?,
            stream_type: stream.stream_type,
            booking_ref: stream.booking_ref,
            version: self.version?,
            recorded_at: self.recorded_at.unwrap_or_else(Utc::now),
            payload: self.payload?,
            metadata: self.metadata,
        })
    }
}

use chrono::{DateTime, Utc};
use common::BookingRef;

/// Filter for reading entries across streams.
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    pub booking_ref: Option<BookingRef>,

    pub stream_type: Option<String>,

    /// Match any of these entry types.
    pub entry_types: Option<Vec<String>>,

    /// Entries recorded at or after this instant.
    pub from_recorded: Option<DateTime<Utc>>,

    /// Entries recorded at or before this instant.
    pub to_recorded: Option<DateTime<Utc>>,

    pub limit: Option<usize>,

    pub offset: Option<usize>,
}

impl EntryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_stream_type(stream_type: impl Into<String>) -> Self {
        Self {
            stream_type: Some(stream_type.into()),
            ..Default::default()
        }
    }

    pub fn booking_ref(mut self, booking_ref: BookingRef) -> Self {
        self.booking_ref = Some(booking_ref);
        self
    }

    pub fn stream_type(mut self, stream_type: impl Into<String>) -> Self {
        self.stream_type = Some(stream_type.into());
        self
    }

    pub fn entry_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_types = Some(vec![entry_type.into()]);
        self
    }

    pub fn entry_types(mut self, entry_types: Vec<String>) -> Self {
        self.entry_types = Some(entry_types);
        self
    }

    pub fn from_recorded(mut self, at: DateTime<Utc>) -> Self {
        self.from_recorded = Some(at);
        self
    }

    pub fn to_recorded(mut self, at: DateTime<Utc>) -> Self {
        self.to_recorded = Some(at);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the entry satisfies every filter except paging.
    pub fn matches(&self, entry: &crate::LedgerEntry) -> bool {
        if let Some(ref r) = self.booking_ref
            && &entry.booking_ref != r
        {
            return false;
        }
        if let Some(ref t) = self.stream_type
            && &entry.stream_type != t
        {
            return false;
        }
        if let Some(ref types) = self.entry_types
            && !types.contains(&entry.entry_type)
        {
            return false;
        }
        if let Some(from) = self.from_recorded
            && entry.recorded_at < from
        {
            return false;
        }
        if let Some(to) = self.to_recorded
            && entry.recorded_at > to
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LedgerEntry, StreamKey, Version};

    fn entry(stream_type: &str, booking_ref: &str, entry_type: &str) -> LedgerEntry {
        LedgerEntry::builder()
            .entry_type(entry_type)
            .stream(StreamKey::new(
                stream_type,
                BookingRef::parse(booking_ref).unwrap(),
            ))
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(EntryQuery::new().matches(&entry("Booking", "TT-1", "DraftReserved")));
    }

    #[test]
    fn filters_combine() {
        let q = EntryQuery::for_stream_type("CheckoutSaga")
            .entry_type("ReconciliationRequired")
            .limit(10);

        assert!(q.matches(&entry("CheckoutSaga", "TT-1", "ReconciliationRequired")));
        assert!(!q.matches(&entry("Booking", "TT-1", "ReconciliationRequired")));
        assert!(!q.matches(&entry("CheckoutSaga", "TT-1", "PaymentAuthorized")));
        assert_eq!(q.limit, Some(10));
    }

    #[test]
    fn booking_ref_filter() {
        let q = EntryQuery::new().booking_ref(BookingRef::parse("TT-2").unwrap());
        assert!(q.matches(&entry("Booking", "TT-2", "DraftReserved")));
        assert!(!q.matches(&entry("Booking", "TT-3", "DraftReserved")));
    }
}

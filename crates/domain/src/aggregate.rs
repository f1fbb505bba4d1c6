//! Core aggregate and domain event traits.

use common::BookingRef;
use ledger::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name, stored as the ledger entry type.
    fn event_type(&self) -> &'static str;
}

/// Trait for event-sourced aggregates keyed by booking reference.
///
/// Aggregates are rebuilt by replaying their stream, produce events from
/// commands, and apply events purely and deterministically.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// Stream type under which the aggregate's entries are stored.
    fn aggregate_type() -> &'static str;

    /// Returns None for a new, uninitialized aggregate.
    fn booking_ref(&self) -> Option<&BookingRef>;

    /// Version starts at 0 for a new aggregate and increments with each event.
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    /// Applies an event. Must not fail: events are facts that already happened.
    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestEvent {
        Opened { booking_ref: BookingRef },
        Noted { value: i32 },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Opened { .. } => "TestOpened",
                TestEvent::Noted { .. } => "TestNoted",
            }
        }
    }

    #[derive(Debug, Default)]
    struct TestAggregate {
        booking_ref: Option<BookingRef>,
        value: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("test error")]
    struct TestError;

    impl Aggregate for TestAggregate {
        type Event = TestEvent;
        type Error = TestError;

        fn aggregate_type() -> &'static str {
            "Test"
        }

        fn booking_ref(&self) -> Option<&BookingRef> {
            self.booking_ref.as_ref()
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TestEvent::Opened { booking_ref } => self.booking_ref = Some(booking_ref),
                TestEvent::Noted { value } => self.value = value,
            }
        }
    }

    #[test]
    fn apply_events_in_order() {
        let mut aggregate = TestAggregate::default();
        aggregate.apply_events(vec![
            TestEvent::Opened {
                booking_ref: BookingRef::parse("TT-1").unwrap(),
            },
            TestEvent::Noted { value: 1 },
            TestEvent::Noted { value: 42 },
        ]);

        assert_eq!(aggregate.booking_ref().map(|r| r.as_str()), Some("TT-1"));
        assert_eq!(aggregate.value, 42);
    }

    #[test]
    fn event_type_names() {
        assert_eq!(TestEvent::Noted { value: 1 }.event_type(), "TestNoted");
    }
}

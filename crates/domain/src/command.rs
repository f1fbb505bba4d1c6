//! Command handling infrastructure.

use std::marker::PhantomData;

use common::BookingRef;
use ledger::{AppendOptions, Ledger, LedgerEntry, StreamKey, Version};
use serde::Serialize;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

/// An intention to change one aggregate. May be rejected by its current state.
pub trait Command: Send + Sync {
    type Aggregate: Aggregate;

    fn booking_ref(&self) -> &BookingRef;
}

/// Loads aggregates from the ledger, runs commands and appends the
/// resulting entries with optimistic concurrency.
pub struct CommandHandler<S, A>
where
    S: Ledger,
    A: Aggregate,
{
    ledger: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: Ledger,
    A: Aggregate,
{
    pub fn new(ledger: S) -> Self {
        Self {
            ledger,
            _phantom: PhantomData,
        }
    }

    pub fn ledger(&self) -> &S {
        &self.ledger
    }

    pub fn stream_key(booking_ref: &BookingRef) -> StreamKey {
        StreamKey::new(A::aggregate_type(), booking_ref.clone())
    }

    /// Replays the aggregate's stream. Returns a default instance when the
    /// stream is empty.
    pub async fn load(&self, booking_ref: &BookingRef) -> Result<A, DomainError>
    where
        A::Event: for<'de> serde::Deserialize<'de>,
    {
        let entries = self.ledger.read_stream(&Self::stream_key(booking_ref)).await?;

        let mut aggregate = A::default();
        for entry in entries {
            let event: A::Event = serde_json::from_value(entry.payload)?;
            aggregate.apply(event);
            aggregate.set_version(entry.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, booking_ref: &BookingRef) -> Result<Option<A>, DomainError>
    where
        A::Event: for<'de> serde::Deserialize<'de>,
    {
        let aggregate = self.load(booking_ref).await?;
        if aggregate.booking_ref().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error. An empty list is a no-op
    /// and nothing is written.
    pub async fn execute<F>(
        &self,
        booking_ref: &BookingRef,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A::Event: for<'de> serde::Deserialize<'de> + Serialize,
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(booking_ref).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        let entries = self.build_entries(booking_ref, current_version, &events)?;

        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };

        let new_version = self.ledger.append(entries, options).await?;

        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    fn build_entries(
        &self,
        booking_ref: &BookingRef,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<LedgerEntry>, DomainError>
    where
        A::Event: Serialize,
    {
        let mut entries = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let entry = LedgerEntry::builder()
                .entry_type(event.event_type())
                .stream(Self::stream_key(booking_ref))
                .version(version)
                .payload(event)?
                .build()
                .ok_or_else(|| DomainError::IncompleteEntry(event.event_type().to_string()))?;
            entries.push(entry);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::InMemoryLedger;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestEvent {
        Created { booking_ref: BookingRef },
        Updated { value: i32 },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "TestCreated",
                TestEvent::Updated { .. } => "TestUpdated",
            }
        }
    }

    #[derive(Debug, Default, Clone)]
    struct TestAggregate {
        booking_ref: Option<BookingRef>,
        value: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("invalid value: {0}")]
        InvalidValue(i32),
    }

    impl Aggregate for TestAggregate {
        type Event = TestEvent;
        type Error = TestError;

        fn aggregate_type() -> &'static str {
            "TestAggregate"
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
                TestEvent::Created { booking_ref } => self.booking_ref = Some(booking_ref),
                TestEvent::Updated { value } => self.value = value,
            }
        }
    }

    impl From<TestError> for DomainError {
        fn from(e: TestError) -> Self {
            DomainError::IncompleteEntry(e.to_string())
        }
    }

    fn booking_ref() -> BookingRef {
        BookingRef::parse("TT-2001").unwrap()
    }

    fn created() -> Vec<TestEvent> {
        vec![TestEvent::Created {
            booking_ref: booking_ref(),
        }]
    }

    #[tokio::test]
    async fn test_execute_creates_aggregate() {
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(InMemoryLedger::new());

        let result = handler
            .execute(&booking_ref(), |_| Ok(created()))
            .await
            .unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.aggregate.booking_ref(), Some(&booking_ref()));
    }

    #[tokio::test]
    async fn test_execute_updates_aggregate() {
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(InMemoryLedger::new());
        handler.execute(&booking_ref(), |_| Ok(created())).await.unwrap();

        let result = handler
            .execute(&booking_ref(), |_| Ok(vec![TestEvent::Updated { value: 42 }]))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.value, 42);

        let reloaded = handler.load(&booking_ref()).await.unwrap();
        assert_eq!(reloaded.value, 42);
        assert_eq!(reloaded.version(), Version::new(2));
    }

    #[tokio::test]
    async fn test_execute_returns_error_on_invalid_command() {
        let ledger = InMemoryLedger::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(ledger.clone());

        let result = handler
            .execute(&booking_ref(), |_| Err(TestError::InvalidValue(-1)))
            .await;

        assert!(result.is_err());
        assert_eq!(ledger.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_load_existing_returns_none_for_new() {
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(InMemoryLedger::new());
        assert!(handler.load_existing(&booking_ref()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_events_returns_without_persisting() {
        let ledger = InMemoryLedger::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(ledger.clone());

        let result = handler.execute(&booking_ref(), |_| Ok(vec![])).await.unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::initial());
        assert_eq!(ledger.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_stale_writer_gets_concurrency_conflict() {
        let ledger = InMemoryLedger::new();
        let handler: CommandHandler<_, TestAggregate> = CommandHandler::new(ledger.clone());
        handler.execute(&booking_ref(), |_| Ok(created())).await.unwrap();

        // A second writer that loaded version 0 tries to create the stream again.
        let stale = LedgerEntry::builder()
            .entry_type("TestCreated")
            .stream(CommandHandler::<InMemoryLedger, TestAggregate>::stream_key(&booking_ref()))
            .version(Version::first())
            .payload(&created()[0])
            .unwrap()
            .build()
            .unwrap();
        let err = ledger
            .append(vec![stale], AppendOptions::expect_new())
            .await
            .unwrap_err();
        assert!(DomainError::from(err).is_concurrency_conflict());
    }
}

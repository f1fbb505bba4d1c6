//! Booking ledger storage.
//!
//! The ledger is an append-only, versioned journal of entries grouped into
//! streams. A stream is identified by a stream type (`Booking`,
//! `CheckoutSaga`) and a booking reference, so every write in the pipeline is
//! keyed by the client-generated reference. Appends use optimistic
//! concurrency on the stream version.
//!
//! The crate also provides the idempotency-key store used to deduplicate
//! repeated submissions for the same reference.

pub mod entry;
pub mod error;
pub mod idempotency;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::BookingRef;
pub use entry::{EntryId, LedgerEntry, LedgerEntryBuilder, StreamKey, Version};
pub use error::{LedgerError, Result};
pub use idempotency::{Claim, IdempotencyStore, InMemoryIdempotencyStore};
pub use memory::InMemoryLedger;
pub use postgres::{PostgresIdempotencyStore, PostgresLedger};
pub use query::EntryQuery;
pub use store::{AppendOptions, Ledger, LedgerExt};

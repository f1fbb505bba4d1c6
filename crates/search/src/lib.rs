//! Hotel quote search.
//!
//! A search fans out to every registered supplier concurrently. Suppliers
//! fail independently: a failing or slow supplier contributes no quotes and
//! never fails the search. Results are deduplicated by hotel and supplier,
//! held per search session, and can be sorted or filtered without touching
//! the network.

pub mod aggregator;
pub mod error;
pub mod quote;
pub mod session;
pub mod supplier;
pub mod view;

pub use aggregator::{AggregateResult, QuoteAggregator, SupplierOutcome, SupplierStatus};
pub use error::{SearchError, SupplierError};
pub use quote::{Occupancy, PriceRange, SearchContext, SupplierQuote, SupplierSearchRequest};
pub use session::{
    DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL, QuoteResultSet, QuoteSelection, SearchSession,
    SearchSessions, SearchSnapshot, SelectedQuote,
};
pub use supplier::{HttpSupplierClient, InMemorySupplier, SupplierClient};
pub use view::{FilterState, SortBy, apply_view};

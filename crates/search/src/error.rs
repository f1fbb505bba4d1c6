use thiserror::Error;
use uuid::Uuid;

/// Failure of a single supplier call. Absorbed by the aggregator.
#[derive(Debug, Clone, Error)]
pub enum SupplierError {
    #[error("supplier {supplier_id} returned HTTP {status}")]
    Status { supplier_id: String, status: u16 },

    #[error("transport error from supplier {supplier_id}: {message}")]
    Transport {
        supplier_id: String,
        message: String,
    },

    #[error("malformed payload from supplier {supplier_id}: {message}")]
    Malformed {
        supplier_id: String,
        message: String,
    },

    #[error("supplier {0} unavailable")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Invalid search: {0}")]
    InvalidContext(String),

    #[error("Search session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Quote {supplier_id}/{hotel_id}/{option_id} is not in search session {session_id}")]
    QuoteNotFound {
        session_id: Uuid,
        supplier_id: String,
        hotel_id: String,
        option_id: String,
    },
}

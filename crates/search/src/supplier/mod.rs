//! Supplier clients.

mod http;
mod memory;

pub use http::HttpSupplierClient;
pub use memory::InMemorySupplier;

use async_trait::async_trait;

use crate::{SupplierError, SupplierQuote, SupplierSearchRequest};

/// A hotel inventory backend behind a uniform quote interface.
#[async_trait]
pub trait SupplierClient: Send + Sync {
    fn supplier_id(&self) -> &str;

    async fn search(
        &self,
        request: &SupplierSearchRequest,
    ) -> Result<Vec<SupplierQuote>, SupplierError>;
}

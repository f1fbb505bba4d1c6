use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use super::SupplierClient;
use crate::{SupplierError, SupplierQuote, SupplierSearchRequest};

#[derive(Debug, Default)]
struct InMemorySupplierState {
    pages: BTreeMap<u32, Vec<SupplierQuote>>,
    fail: bool,
    panic: bool,
    delay: Option<Duration>,
    calls: usize,
}

/// Supplier serving fixed quotes per page, with failure injection.
#[derive(Debug, Clone)]
pub struct InMemorySupplier {
    supplier_id: String,
    state: Arc<RwLock<InMemorySupplierState>>,
}

impl InMemorySupplier {
    pub fn new(supplier_id: impl Into<String>) -> Self {
        Self {
            supplier_id: supplier_id.into(),
            state: Arc::default(),
        }
    }

    /// Creates a supplier answering page 1 with these quotes.
    pub fn with_quotes(supplier_id: impl Into<String>, quotes: Vec<SupplierQuote>) -> Self {
        let supplier = Self::new(supplier_id);
        supplier.set_page(1, quotes);
        supplier
    }

    pub fn set_page(&self, page: u32, quotes: Vec<SupplierQuote>) {
        self.write().pages.insert(page, quotes);
    }

    pub fn set_fail(&self, fail: bool) {
        self.write().fail = fail;
    }

    /// Makes the search task panic, as a buggy client would.
    pub fn set_panic(&self, panic: bool) {
        self.write().panic = panic;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.write().delay = delay;
    }

    pub fn call_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemorySupplierState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SupplierClient for InMemorySupplier {
    fn supplier_id(&self) -> &str {
        &self.supplier_id
    }

    async fn search(
        &self,
        request: &SupplierSearchRequest,
    ) -> Result<Vec<SupplierQuote>, SupplierError> {
        let (delay, fail, panic, quotes) = {
            let mut state = self.write();
            state.calls += 1;
            (
                state.delay,
                state.fail,
                state.panic,
                state.pages.get(&request.page).cloned().unwrap_or_default(),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if panic {
            panic!("supplier {} crashed", self.supplier_id);
        }
        if fail {
            return Err(SupplierError::Unavailable(self.supplier_id.clone()));
        }
        Ok(quotes)
    }
}

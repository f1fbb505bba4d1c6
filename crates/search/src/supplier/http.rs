use async_trait::async_trait;

use super::SupplierClient;
use crate::quote::SupplierResponseWire;
use crate::{SupplierError, SupplierQuote, SupplierSearchRequest};

/// Supplier reached over HTTP: `POST {endpoint}` with the search request,
/// answered by `{"success": [...]}`.
#[derive(Debug, Clone)]
pub struct HttpSupplierClient {
    supplier_id: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSupplierClient {
    pub fn new(supplier_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::with_client(supplier_id, endpoint, reqwest::Client::new())
    }

    pub fn with_client(
        supplier_id: impl Into<String>,
        endpoint: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            supplier_id: supplier_id.into(),
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SupplierClient for HttpSupplierClient {
    fn supplier_id(&self) -> &str {
        &self.supplier_id
    }

    #[tracing::instrument(skip(self, request), fields(supplier = %self.supplier_id))]
    async fn search(
        &self,
        request: &SupplierSearchRequest,
    ) -> Result<Vec<SupplierQuote>, SupplierError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| SupplierError::Transport {
                supplier_id: self.supplier_id.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SupplierError::Status {
                supplier_id: self.supplier_id.clone(),
                status: status.as_u16(),
            });
        }

        let body: SupplierResponseWire =
            response.json().await.map_err(|e| SupplierError::Malformed {
                supplier_id: self.supplier_id.clone(),
                message: e.to_string(),
            })?;

        body.success
            .into_iter()
            .map(|wire| wire.into_quote(&self.supplier_id))
            .collect()
    }
}

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{config::ShipmentConfig, errors::ServiceError, models::PackageDimensions};

/// Port to the shipment collaborator. Callers treat every error as
/// non-fatal; a missed shipment is created manually later.
#[async_trait]
pub trait ShipmentApi: Send + Sync {
    async fn create_shipment(
        &self,
        order_id: Uuid,
        package: &PackageDimensions,
    ) -> Result<(), ServiceError>;
}

#[derive(Debug, Serialize)]
struct CreateShipmentRequest<'a> {
    order_id: Uuid,
    package: &'a PackageDimensions,
}

/// reqwest-backed shipment client.
#[derive(Debug, Clone)]
pub struct HttpShipmentClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpShipmentClient {
    pub fn from_config(cfg: &ShipmentConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ShipmentApi for HttpShipmentClient {
    #[instrument(skip(self, package))]
    async fn create_shipment(
        &self,
        order_id: Uuid,
        package: &PackageDimensions,
    ) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(format!("{}/api/v1/shipments", self.base_url))
            .json(&CreateShipmentRequest { order_id, package })
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("shipment service: {}", e)))?;

        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::ExternalServiceError(format!(
            "shipment service returned {}: {}",
            status, body
        )))
    }
}

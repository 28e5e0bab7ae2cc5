use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{config::GatewayConfig, errors::ServiceError, models::GatewayOrder};

/// Port to the payment gateway adapter. Only gateway-order creation goes
/// through here; the capture widget itself is an opaque, externally hosted
/// surface whose three callbacks re-enter through the checkout service.
#[async_trait]
pub trait PaymentGatewayApi: Send + Sync {
    async fn create_gateway_order(&self, order_id: Uuid) -> Result<GatewayOrder, ServiceError>;
}

#[derive(Debug, Serialize)]
struct CreateGatewayOrderRequest {
    order_id: Uuid,
}

/// reqwest-backed gateway adapter client.
#[derive(Debug, Clone)]
pub struct HttpPaymentGatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPaymentGatewayClient {
    pub fn from_config(cfg: &GatewayConfig) -> Result<Self, ServiceError> {
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
impl PaymentGatewayApi for HttpPaymentGatewayClient {
    #[instrument(skip(self))]
    async fn create_gateway_order(&self, order_id: Uuid) -> Result<GatewayOrder, ServiceError> {
        let response = self
            .http
            .post(format!("{}/api/v1/gateway/orders", self.base_url))
            .json(&CreateGatewayOrderRequest { order_id })
            .send()
            .await
            .map_err(|e| ServiceError::GatewayInitFailed(format!("gateway: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::GatewayInitFailed(format!(
                "gateway returned {}: {}",
                status, body
            )));
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| ServiceError::GatewayInitFailed(format!("gateway payload: {}", e)))
    }
}

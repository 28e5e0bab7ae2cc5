use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    config::UpstreamConfig,
    errors::ServiceError,
    models::{Address, FailureReason, NewAddress, PaymentMethod, PlacedOrder, ShippingMethod},
};

/// Order creation input. The order backend resolves cart contents and
/// totals server-side; the client only names the selections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address_id: Uuid,
    pub billing_address_id: Uuid,
    pub payment_method: PaymentMethod,
    pub shipping_method: ShippingMethod,
}

/// Input to the verification endpoint, the sole authority for marking an
/// order paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    pub gateway_order_ref: String,
    pub gateway_payment_ref: String,
    pub signature: String,
}

/// Input to the fail endpoint. `reason` is a stable contract value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailPaymentRequest {
    pub order_id: Uuid,
    pub gateway_order_ref: String,
    pub reason: FailureReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Port to the order backend. Verify/fail calls are expected to be
/// idempotent server-side, keyed by (order id, gateway payment ref).
#[async_trait]
pub trait OrderServiceApi: Send + Sync {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<PlacedOrder, ServiceError>;

    async fn verify_payment(&self, request: &VerifyPaymentRequest) -> Result<(), ServiceError>;

    async fn fail_payment(&self, request: &FailPaymentRequest) -> Result<(), ServiceError>;

    /// Clears the session cart. Called only on settlement.
    async fn delete_cart(&self) -> Result<(), ServiceError>;

    /// Inline address creation from the shipping step.
    async fn create_address(&self, address: &NewAddress) -> Result<Address, ServiceError>;
}

/// Structured error payload returned by the order backend.
#[derive(Debug, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    code: String,
    message: String,
}

/// reqwest-backed order backend client.
#[derive(Debug, Clone)]
pub struct HttpOrderServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpOrderServiceClient {
    pub fn from_config(cfg: &UpstreamConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_error(response: reqwest::Response) -> (String, String) {
        let status = response.status();
        match response.json::<UpstreamError>().await {
            Ok(err) => (err.code, err.message),
            Err(_) => (String::new(), format!("order service returned {}", status)),
        }
    }
}

#[async_trait]
impl OrderServiceApi for HttpOrderServiceClient {
    #[instrument(skip(self))]
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<PlacedOrder, ServiceError> {
        let response = self
            .http
            .post(self.url("/api/v1/orders"))
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("order service: {}", e)))?;

        if response.status().is_success() {
            return response
                .json::<PlacedOrder>()
                .await
                .map_err(|e| ServiceError::SerializationError(e.to_string()));
        }

        let status = response.status();
        let (code, message) = Self::read_error(response).await;
        if status.is_client_error() {
            match code.as_str() {
                "insufficient_stock" => Err(ServiceError::InsufficientStock(message)),
                _ => Err(ServiceError::OrderRejected(message)),
            }
        } else {
            Err(ServiceError::ExternalServiceError(message))
        }
    }

    #[instrument(skip(self), fields(order_id = %request.order_id))]
    async fn verify_payment(&self, request: &VerifyPaymentRequest) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(self.url(&format!(
                "/api/v1/orders/{}/payment/verify",
                request.order_id
            )))
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("order service: {}", e)))?;

        if response.status().is_success() {
            return Ok(());
        }
        let (_, message) = Self::read_error(response).await;
        Err(ServiceError::VerificationFailed(message))
    }

    #[instrument(skip(self), fields(order_id = %request.order_id, reason = %request.reason))]
    async fn fail_payment(&self, request: &FailPaymentRequest) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(self.url(&format!("/api/v1/orders/{}/payment/fail", request.order_id)))
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("order service: {}", e)))?;

        if response.status().is_success() {
            return Ok(());
        }
        let (_, message) = Self::read_error(response).await;
        Err(ServiceError::ExternalServiceError(message))
    }

    #[instrument(skip(self))]
    async fn delete_cart(&self) -> Result<(), ServiceError> {
        let response = self
            .http
            .delete(self.url("/api/v1/cart"))
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("order service: {}", e)))?;

        if response.status().is_success() {
            return Ok(());
        }
        let (_, message) = Self::read_error(response).await;
        Err(ServiceError::ExternalServiceError(message))
    }

    #[instrument(skip(self, address))]
    async fn create_address(&self, address: &NewAddress) -> Result<Address, ServiceError> {
        let response = self
            .http
            .post(self.url("/api/v1/addresses"))
            .json(address)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("order service: {}", e)))?;

        if response.status().is_success() {
            return response
                .json::<Address>()
                .await
                .map_err(|e| ServiceError::SerializationError(e.to_string()));
        }
        let status = response.status();
        let (_, message) = Self::read_error(response).await;
        if status.is_client_error() {
            Err(ServiceError::ValidationError(message))
        } else {
            Err(ServiceError::ExternalServiceError(message))
        }
    }
}

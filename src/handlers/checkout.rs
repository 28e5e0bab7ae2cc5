use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    response::Response,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::ServiceError,
    handlers::common::{created_response, success_response, validate_input},
    models::{
        Address, CaptureRequest, CartLine, CartSnapshot, CheckoutSelection, Confirmation,
        NewAddress, PaymentMethod, PlacedOrder, PricingQuote, ShippingMethod,
    },
    services::{CheckoutAttempt, CheckoutState, Placement},
    AppState,
};

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(start_checkout))
        .route("/{attempt_id}", get(get_attempt))
        .route("/{attempt_id}/shipping", put(select_shipping))
        .route("/{attempt_id}/payment-method", put(select_payment_method))
        .route("/{attempt_id}/back", post(step_back))
        .route("/{attempt_id}/place", post(place_order))
        .route("/{attempt_id}/capture/success", post(capture_success))
        .route("/{attempt_id}/capture/dismiss", post(capture_dismiss))
        .route("/{attempt_id}/capture/failure", post(capture_failure))
}

/// Start a checkout attempt from a cart snapshot
async fn start_checkout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartCheckoutRequest>,
) -> Result<Response, ServiceError> {
    let cart = CartSnapshot::new(payload.lines, payload.discount.unwrap_or_default());
    let attempt = state.services.checkout.start(cart).await?;
    let view = AttemptView::build(&state, &attempt);
    state.attempts.insert(attempt);
    Ok(created_response(view))
}

/// Current attempt state, selections, and a fresh quote
async fn get_attempt(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let attempt = state.attempts.get(attempt_id)?;
    let guard = attempt.lock().await;
    Ok(success_response(AttemptView::build(&state, &guard)))
}

/// Select (or inline-create) the shipping address and shipping method
async fn select_shipping(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<ShippingRequest>,
) -> Result<Response, ServiceError> {
    let attempt = state.attempts.get(attempt_id)?;
    let mut guard = attempt.lock().await;

    match (payload.address, payload.new_address) {
        (Some(address), None) => {
            guard.select_shipping(address, payload.shipping_method)?;
        }
        (None, Some(new_address)) => {
            validate_input(&new_address)?;
            state
                .services
                .checkout
                .create_and_select_address(&mut guard, new_address, payload.shipping_method)
                .await?;
        }
        _ => {
            return Err(ServiceError::ValidationError(
                "provide exactly one of `address` or `new_address`".to_string(),
            ))
        }
    }

    Ok(success_response(AttemptView::build(&state, &guard)))
}

/// Select the payment method
async fn select_payment_method(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<PaymentMethodRequest>,
) -> Result<Response, ServiceError> {
    let attempt = state.attempts.get(attempt_id)?;
    let mut guard = attempt.lock().await;
    guard.select_payment(payload.payment_method)?;
    Ok(success_response(AttemptView::build(&state, &guard)))
}

/// Step back one wizard step, keeping selections
async fn step_back(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let attempt = state.attempts.get(attempt_id)?;
    let mut guard = attempt.lock().await;
    guard.back()?;
    Ok(success_response(AttemptView::build(&state, &guard)))
}

/// Place the order (idempotent while a submission is in flight)
async fn place_order(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let attempt = state.attempts.get(attempt_id)?;
    let mut guard = attempt.lock().await;
    let placement = state.services.checkout.place_order(&mut guard).await?;
    Ok(success_response(PlacementResponse::from(placement)))
}

/// Capture widget success callback
async fn capture_success(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<CaptureSuccessRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let attempt = state.attempts.get(attempt_id)?;
    let mut guard = attempt.lock().await;
    let confirmation = state
        .services
        .checkout
        .capture_succeeded(&mut guard, payload.gateway_payment_ref, payload.signature)
        .await?;
    Ok(success_response(confirmation))
}

/// Capture widget dismiss callback (user closed the widget)
async fn capture_dismiss(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let attempt = state.attempts.get(attempt_id)?;
    let mut guard = attempt.lock().await;
    let confirmation = state.services.checkout.capture_dismissed(&mut guard).await?;
    Ok(success_response(confirmation))
}

/// Capture widget failure callback (gateway-reported)
async fn capture_failure(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<CaptureFailureRequest>,
) -> Result<Response, ServiceError> {
    let attempt = state.attempts.get(attempt_id)?;
    let mut guard = attempt.lock().await;
    let confirmation = state
        .services
        .checkout
        .capture_failed(&mut guard, payload.error_code, payload.error_description)
        .await?;
    Ok(success_response(confirmation))
}

// Request/Response DTOs

#[derive(Debug, Deserialize)]
pub struct StartCheckoutRequest {
    pub lines: Vec<CartLine>,
    pub discount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ShippingRequest {
    pub address: Option<Address>,
    pub new_address: Option<NewAddress>,
    #[serde(default)]
    pub shipping_method: ShippingMethod,
}

#[derive(Debug, Deserialize)]
pub struct PaymentMethodRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CaptureSuccessRequest {
    #[validate(length(min = 1))]
    pub gateway_payment_ref: String,
    #[validate(length(min = 1))]
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct CaptureFailureRequest {
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttemptView {
    pub id: Uuid,
    pub state: CheckoutState,
    pub selection: CheckoutSelection,
    pub quote: PricingQuote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<PlacedOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Confirmation>,
}

impl AttemptView {
    fn build(state: &AppState, attempt: &CheckoutAttempt) -> Self {
        Self {
            id: attempt.id,
            state: attempt.state,
            selection: attempt.selection.clone(),
            quote: state.services.checkout.quote(attempt),
            order: attempt.order.clone(),
            confirmation: attempt.confirmation.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlacementResponse {
    Confirmed { confirmation: Confirmation },
    AwaitingCapture { capture: CaptureRequest },
    InFlight,
}

impl From<Placement> for PlacementResponse {
    fn from(placement: Placement) -> Self {
        match placement {
            Placement::Confirmed(confirmation) => Self::Confirmed { confirmation },
            Placement::AwaitingCapture(capture) => Self::AwaitingCapture { capture },
            Placement::InFlight => Self::InFlight,
        }
    }
}

//! End-to-end tests of the HTTP wizard surface, with the collaborators
//! replaced by in-memory doubles.

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use checkout_api::{
    config::{AppConfig, GatewayConfig, PricingConfig, ShipmentConfig, UpstreamConfig},
    app_router, AppState,
};
use common::Harness;

fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        log_level: "info".into(),
        log_json: false,
        attempt_retention_secs: 3600,
        pricing: PricingConfig::default(),
        order_service: UpstreamConfig {
            base_url: "http://order-service.invalid".into(),
            timeout_secs: 1,
        },
        gateway: GatewayConfig {
            base_url: "http://gateway.invalid".into(),
            timeout_secs: 1,
        },
        shipment: ShipmentConfig {
            base_url: "http://shipments.invalid".into(),
            timeout_secs: 1,
            package: Default::default(),
        },
    }
}

fn test_app(h: &Harness) -> Router {
    let state = Arc::new(AppState::new(test_config(), Arc::new(h.checkout.clone())));
    app_router(state)
}

async fn request(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::from("{}")).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn response_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

fn cart_payload() -> Value {
    json!({
        "lines": [
            { "variant_id": uuid::Uuid::new_v4(), "name": "Ceramic Tea Set", "unit_price": "4999", "quantity": 1 }
        ]
    })
}

fn address_payload() -> Value {
    json!({
        "address": {
            "id": uuid::Uuid::new_v4(),
            "name": "Asha Rao",
            "phone": "9876543210",
            "line1": "14 MG Road",
            "city": "Bengaluru",
            "state": "KA",
            "postal_code": "560001",
            "country": "IN"
        },
        "shipping_method": "standard"
    })
}

#[tokio::test]
async fn cod_wizard_flow_over_http() {
    let h = Harness::new(dec!(5899));
    let app = test_app(&h);

    // Start
    let response = request(&app, Method::POST, "/api/v1/checkout", Some(cart_payload())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["state"], "shipping");
    // Free shipping over the threshold, 18% tax on 4999
    assert_eq!(body["quote"]["shipping_cost"], "0");
    assert_eq!(body["quote"]["total"], "5899");
    let id = body["id"].as_str().unwrap().to_string();

    // Shipping
    let response = request(
        &app,
        Method::PUT,
        &format!("/api/v1/checkout/{}/shipping", id),
        Some(address_payload()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["state"], "payment");

    // Payment method
    let response = request(
        &app,
        Method::PUT,
        &format!("/api/v1/checkout/{}/payment-method", id),
        Some(json!({ "payment_method": "cod" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["state"], "review");

    // Place
    let response = request(
        &app,
        Method::POST,
        &format!("/api/v1/checkout/{}/place", id),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["confirmation"]["success"], true);
    assert_eq!(body["confirmation"]["order_number"], "ORD-TEST-1001");

    // Final state visible on GET
    let response = request(&app, Method::GET, &format!("/api/v1/checkout/{}", id), None).await;
    assert_eq!(response_json(response).await["state"], "settled");
    assert_eq!(h.orders.created(), 1);
}

#[tokio::test]
async fn gateway_flow_over_http_returns_capture_seed() {
    let h = Harness::new(dec!(5899));
    let app = test_app(&h);

    let body = response_json(
        request(&app, Method::POST, "/api/v1/checkout", Some(cart_payload())).await,
    )
    .await;
    let id = body["id"].as_str().unwrap().to_string();

    request(
        &app,
        Method::PUT,
        &format!("/api/v1/checkout/{}/shipping", id),
        Some(address_payload()),
    )
    .await;
    request(
        &app,
        Method::PUT,
        &format!("/api/v1/checkout/{}/payment-method", id),
        Some(json!({ "payment_method": "gateway" })),
    )
    .await;

    let response = request(
        &app,
        Method::POST,
        &format!("/api/v1/checkout/{}/place", id),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "awaiting_capture");
    assert_eq!(body["capture"]["gateway_order_ref"], "gworder_test_1");
    assert_eq!(body["capture"]["prefill"]["name"], "Asha Rao");

    // Widget success callback
    let response = request(
        &app,
        Method::POST,
        &format!("/api/v1/checkout/{}/capture/success", id),
        Some(json!({ "gateway_payment_ref": "pay_1", "signature": "sig_1" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["payment_id"], "pay_1");

    // Late dismiss is ignored; the recorded outcome is returned.
    let response = request(
        &app,
        Method::POST,
        &format!("/api/v1/checkout/{}/capture/dismiss", id),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["success"], true);
    assert!(h.orders.fail_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_attempt_is_not_found() {
    let h = Harness::new(dec!(5899));
    let app = test_app(&h);

    let response = request(
        &app,
        Method::GET,
        &format!("/api/v1/checkout/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shipping_requires_exactly_one_address_form() {
    let h = Harness::new(dec!(5899));
    let app = test_app(&h);

    let body = response_json(
        request(&app, Method::POST, "/api/v1/checkout", Some(cart_payload())).await,
    )
    .await;
    let id = body["id"].as_str().unwrap().to_string();

    let response = request(
        &app,
        Method::PUT,
        &format!("/api/v1/checkout/{}/shipping", id),
        Some(json!({ "shipping_method": "standard" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_cart_cannot_start_checkout() {
    let h = Harness::new(dec!(5899));
    let app = test_app(&h);

    let response = request(
        &app,
        Method::POST,
        "/api/v1/checkout",
        Some(json!({ "lines": [] })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let h = Harness::new(dec!(5899));
    let app = test_app(&h);

    let response = request(&app, Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "ok");
}

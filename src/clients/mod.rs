//! Ports to the external collaborators the checkout orchestrator depends
//! on. Each is an injected trait with a reqwest-backed production
//! implementation; tests substitute in-memory doubles.

pub mod gateway;
pub mod order_service;
pub mod shipments;

pub use gateway::{HttpPaymentGatewayClient, PaymentGatewayApi};
pub use order_service::{
    CreateOrderRequest, FailPaymentRequest, HttpOrderServiceClient, OrderServiceApi,
    VerifyPaymentRequest,
};
pub use shipments::{HttpShipmentClient, ShipmentApi};

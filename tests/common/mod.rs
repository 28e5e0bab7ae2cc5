//! Shared test doubles for the external collaborators, plus helpers to
//! drive a checkout attempt to interesting states.
#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use checkout_api::{
    clients::{
        CreateOrderRequest, FailPaymentRequest, OrderServiceApi, PaymentGatewayApi, ShipmentApi,
        VerifyPaymentRequest,
    },
    config::PricingConfig,
    errors::ServiceError,
    events,
    models::{
        minor_units, Address, CaptureRequest, CartLine, CartSnapshot, GatewayOrder, NewAddress,
        PackageDimensions, PaymentMethod, PlacedOrder, ShippingMethod,
    },
    services::{
        CheckoutAttempt, CheckoutService, PaymentReconciliationService, Placement, ShipmentService,
    },
};

pub const TEST_GATEWAY_KEY: &str = "gw_test_key_1";
pub const TEST_GATEWAY_ORDER_REF: &str = "gworder_test_1";

/// In-memory order backend recording every call.
pub struct MockOrderService {
    order: PlacedOrder,
    pub create_order_calls: AtomicUsize,
    pub reject_create: Mutex<Option<String>>,
    pub verify_calls: Mutex<Vec<VerifyPaymentRequest>>,
    pub reject_verify: AtomicBool,
    pub fail_calls: Mutex<Vec<FailPaymentRequest>>,
    pub fail_payment_unreachable: AtomicBool,
    pub delete_cart_calls: AtomicUsize,
    pub delete_cart_fails: AtomicBool,
}

impl MockOrderService {
    pub fn new(total: Decimal) -> Arc<Self> {
        Arc::new(Self {
            order: PlacedOrder {
                order_id: Uuid::new_v4(),
                order_number: "ORD-TEST-1001".to_string(),
                total,
            },
            create_order_calls: AtomicUsize::new(0),
            reject_create: Mutex::new(None),
            verify_calls: Mutex::new(Vec::new()),
            reject_verify: AtomicBool::new(false),
            fail_calls: Mutex::new(Vec::new()),
            fail_payment_unreachable: AtomicBool::new(false),
            delete_cart_calls: AtomicUsize::new(0),
            delete_cart_fails: AtomicBool::new(false),
        })
    }

    pub fn order(&self) -> PlacedOrder {
        self.order.clone()
    }

    pub fn created(&self) -> usize {
        self.create_order_calls.load(Ordering::SeqCst)
    }

    pub fn carts_deleted(&self) -> usize {
        self.delete_cart_calls.load(Ordering::SeqCst)
    }

    pub fn fail_reasons(&self) -> Vec<String> {
        self.fail_calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.reason.to_string())
            .collect()
    }
}

#[async_trait]
impl OrderServiceApi for MockOrderService {
    async fn create_order(&self, _request: &CreateOrderRequest) -> Result<PlacedOrder, ServiceError> {
        self.create_order_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.reject_create.lock().unwrap().clone() {
            return Err(ServiceError::OrderRejected(message));
        }
        Ok(self.order.clone())
    }

    async fn verify_payment(&self, request: &VerifyPaymentRequest) -> Result<(), ServiceError> {
        self.verify_calls.lock().unwrap().push(request.clone());
        if self.reject_verify.load(Ordering::SeqCst) {
            return Err(ServiceError::VerificationFailed("signature mismatch".into()));
        }
        Ok(())
    }

    async fn fail_payment(&self, request: &FailPaymentRequest) -> Result<(), ServiceError> {
        self.fail_calls.lock().unwrap().push(request.clone());
        if self.fail_payment_unreachable.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError(
                "order service unreachable".into(),
            ));
        }
        Ok(())
    }

    async fn delete_cart(&self) -> Result<(), ServiceError> {
        self.delete_cart_calls.fetch_add(1, Ordering::SeqCst);
        if self.delete_cart_fails.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError("cart delete failed".into()));
        }
        Ok(())
    }

    async fn create_address(&self, address: &NewAddress) -> Result<Address, ServiceError> {
        Ok(Address {
            id: Uuid::new_v4(),
            name: address.name.clone(),
            phone: address.phone.clone(),
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
        })
    }
}

/// In-memory gateway adapter.
pub struct MockGateway {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub amount_minor: AtomicI64,
}

impl MockGateway {
    pub fn for_total(total: Decimal) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            amount_minor: AtomicI64::new(minor_units(total).expect("total fits minor units")),
        })
    }
}

#[async_trait]
impl PaymentGatewayApi for MockGateway {
    async fn create_gateway_order(&self, _order_id: Uuid) -> Result<GatewayOrder, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayInitFailed("gateway timeout".into()));
        }
        Ok(GatewayOrder {
            gateway_key: TEST_GATEWAY_KEY.to_string(),
            amount_minor: self.amount_minor.load(Ordering::SeqCst),
            currency: "INR".to_string(),
            gateway_order_ref: TEST_GATEWAY_ORDER_REF.to_string(),
        })
    }
}

/// In-memory shipment backend.
#[derive(Default)]
pub struct MockShipment {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl MockShipment {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ShipmentApi for MockShipment {
    async fn create_shipment(
        &self,
        _order_id: Uuid,
        _package: &PackageDimensions,
    ) -> Result<(), ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError("label printer on fire".into()));
        }
        Ok(())
    }
}

/// A checkout service wired to the mock collaborators.
pub struct Harness {
    pub orders: Arc<MockOrderService>,
    pub gateway: Arc<MockGateway>,
    pub shipments: Arc<MockShipment>,
    pub checkout: CheckoutService,
    _event_rx: tokio::sync::mpsc::Receiver<events::Event>,
}

impl Harness {
    pub fn new(total: Decimal) -> Self {
        let orders = MockOrderService::new(total);
        let gateway = MockGateway::for_total(total);
        let shipments = MockShipment::new();
        let (event_sender, event_rx) = events::channel(256);

        let orders_api: Arc<dyn OrderServiceApi> = orders.clone();
        let gateway_api: Arc<dyn PaymentGatewayApi> = gateway.clone();
        let shipment_api: Arc<dyn ShipmentApi> = shipments.clone();

        let reconciliation =
            PaymentReconciliationService::new(orders_api.clone(), gateway_api, event_sender.clone());
        let shipment_service = ShipmentService::new(
            shipment_api,
            PackageDimensions {
                length_cm: dec!(10),
                width_cm: dec!(10),
                height_cm: dec!(10),
                weight_kg: dec!(0.5),
            },
            event_sender.clone(),
        );
        let checkout = CheckoutService::new(
            orders_api,
            reconciliation,
            shipment_service,
            PricingConfig::default(),
            event_sender,
        );

        Self {
            orders,
            gateway,
            shipments,
            checkout,
            _event_rx: event_rx,
        }
    }
}

pub fn cart() -> CartSnapshot {
    CartSnapshot::new(
        vec![CartLine {
            variant_id: Uuid::new_v4(),
            name: "Ceramic Tea Set".to_string(),
            unit_price: dec!(4999),
            quantity: 1,
        }],
        dec!(0),
    )
}

pub fn address() -> Address {
    Address {
        id: Uuid::new_v4(),
        name: "Asha Rao".to_string(),
        phone: "9876543210".to_string(),
        line1: "14 MG Road".to_string(),
        line2: None,
        city: "Bengaluru".to_string(),
        state: "KA".to_string(),
        postal_code: "560001".to_string(),
        country: "IN".to_string(),
    }
}

/// Drives a fresh attempt through the wizard to the review step.
pub async fn attempt_at_review(h: &Harness, method: PaymentMethod) -> CheckoutAttempt {
    let mut attempt = h.checkout.start(cart()).await.expect("start checkout");
    attempt
        .select_shipping(address(), ShippingMethod::Standard)
        .expect("select shipping");
    attempt.select_payment(method).expect("select payment");
    attempt
}

/// Places a gateway order and returns the attempt awaiting capture.
pub async fn attempt_awaiting_capture(h: &Harness) -> (CheckoutAttempt, CaptureRequest) {
    let mut attempt = attempt_at_review(h, PaymentMethod::Gateway).await;
    match h.checkout.place_order(&mut attempt).await.expect("place order") {
        Placement::AwaitingCapture(capture) => (attempt, capture),
        other => panic!("expected capture handoff, got {:?}", other),
    }
}

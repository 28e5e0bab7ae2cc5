use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    clients::{CreateOrderRequest, OrderServiceApi},
    config::PricingConfig,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        Address, CaptureRequest, CartSnapshot, CheckoutSelection, Confirmation, GatewayOrder,
        NewAddress, PaymentMethod, PlacedOrder, PricingQuote, ShippingMethod,
    },
    services::{
        pricing::PricingService, reconciliation::PaymentReconciliationService,
        shipments::ShipmentService,
    },
};

/// User-visible copy for the verification-failure path. Deliberately
/// distinct from "payment not completed": money may have been captured.
const VERIFICATION_FAILED_MESSAGE: &str = "We could not confirm your payment. If any amount was \
     deducted, it will be investigated and refunded.";

const CANCELLED_MESSAGE: &str = "Payment was cancelled. Your cart has been kept so you can try again.";

const GATEWAY_INIT_FAILED_MESSAGE: &str = "Payment could not be initialized. Your order has been \
     recorded and will be reconciled by support.";

/// One tagged state per attempt. Wizard steps first, then the order and
/// payment lifecycle once submission starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckoutState {
    Shipping,
    Payment,
    Review,
    Submitting,
    AwaitingGatewayConfirmation,
    Settled,
    Failed,
    Cancelled,
}

impl CheckoutState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Failed | Self::Cancelled)
    }
}

/// A single checkout attempt: the cart snapshot, the wizard selections,
/// and the lifecycle state. Terminal attempts are never resumed; a new
/// attempt starts from scratch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutAttempt {
    pub id: Uuid,
    pub cart: CartSnapshot,
    pub selection: CheckoutSelection,
    pub state: CheckoutState,
    pub order: Option<PlacedOrder>,
    pub gateway_order: Option<GatewayOrder>,
    pub capture: Option<CaptureRequest>,
    pub confirmation: Option<Confirmation>,
    pub created_at: DateTime<Utc>,
}

impl CheckoutAttempt {
    pub fn new(cart: CartSnapshot) -> Result<Self, ServiceError> {
        if cart.is_empty() {
            return Err(ServiceError::ValidationError(
                "cannot start checkout with an empty cart".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            cart,
            selection: CheckoutSelection::default(),
            state: CheckoutState::Shipping,
            order: None,
            gateway_order: None,
            capture: None,
            confirmation: None,
            created_at: Utc::now(),
        })
    }

    /// Selects the shipping address (billing defaults to it) and the
    /// shipping method, advancing to the payment step.
    pub fn select_shipping(
        &mut self,
        address: Address,
        method: ShippingMethod,
    ) -> Result<(), ServiceError> {
        self.expect_state(CheckoutState::Shipping)?;
        self.selection.shipping_address = Some(address);
        self.selection.shipping_method = method;
        self.state = CheckoutState::Payment;
        Ok(())
    }

    /// Selects the payment method, advancing to the review step. No
    /// network calls happen here.
    pub fn select_payment(&mut self, method: PaymentMethod) -> Result<(), ServiceError> {
        self.expect_state(CheckoutState::Payment)?;
        self.selection.payment_method = Some(method);
        self.state = CheckoutState::Review;
        Ok(())
    }

    /// Steps back one wizard step without discarding selections.
    pub fn back(&mut self) -> Result<(), ServiceError> {
        self.state = match self.state {
            CheckoutState::Review => CheckoutState::Payment,
            CheckoutState::Payment => CheckoutState::Shipping,
            other => {
                return Err(ServiceError::InvalidOperation(format!(
                    "cannot go back from {}",
                    other
                )))
            }
        };
        Ok(())
    }

    fn expect_state(&self, expected: CheckoutState) -> Result<(), ServiceError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ServiceError::InvalidOperation(format!(
                "expected {} step, attempt is in {}",
                expected, self.state
            )))
        }
    }

    /// Validates that the attempt is ready for submission. Runs before
    /// any network call; failures keep the attempt in `Review`.
    fn validate_for_submission(&self) -> Result<(Address, PaymentMethod), ServiceError> {
        let address = self
            .selection
            .shipping_address
            .clone()
            .ok_or_else(|| ServiceError::ValidationError("no shipping address selected".into()))?;
        let payment_method = self
            .selection
            .payment_method
            .ok_or_else(|| ServiceError::ValidationError("no payment method selected".into()))?;
        if self.cart.is_empty() {
            return Err(ServiceError::ValidationError("cart is empty".into()));
        }
        Ok((address, payment_method))
    }
}

/// Outcome of a `place_order` call.
#[derive(Debug, Clone)]
pub enum Placement {
    /// The attempt settled (COD, or a duplicate call after settlement).
    Confirmed(Confirmation),
    /// Gateway payment: the caller must present the capture widget.
    AwaitingCapture(CaptureRequest),
    /// A submission is already in flight; this call was a no-op.
    InFlight,
}

/// Orchestrates the order/payment lifecycle for checkout attempts.
///
/// The ordering guarantee (order before gateway order before capture
/// before verification) comes from the state transitions below, never
/// from timing assumptions.
#[derive(Clone)]
pub struct CheckoutService {
    orders: Arc<dyn OrderServiceApi>,
    reconciliation: PaymentReconciliationService,
    shipments: ShipmentService,
    pricing: PricingService,
    pricing_config: PricingConfig,
    events: EventSender,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderServiceApi>,
        reconciliation: PaymentReconciliationService,
        shipments: ShipmentService,
        pricing_config: PricingConfig,
        events: EventSender,
    ) -> Self {
        Self {
            orders,
            reconciliation,
            shipments,
            pricing: PricingService::new(),
            pricing_config,
            events,
        }
    }

    /// Starts a new attempt from a cart snapshot.
    #[instrument(skip(self, cart))]
    pub async fn start(&self, cart: CartSnapshot) -> Result<CheckoutAttempt, ServiceError> {
        let attempt = CheckoutAttempt::new(cart)?;
        self.events
            .send(Event::CheckoutStarted {
                attempt_id: attempt.id,
            })
            .await;
        Ok(attempt)
    }

    /// Creates an address through the order backend and selects it as the
    /// shipping address.
    #[instrument(skip(self, attempt, address))]
    pub async fn create_and_select_address(
        &self,
        attempt: &mut CheckoutAttempt,
        address: NewAddress,
        method: ShippingMethod,
    ) -> Result<Address, ServiceError> {
        attempt.expect_state(CheckoutState::Shipping)?;
        let created = self.orders.create_address(&address).await?;
        attempt.select_shipping(created.clone(), method)?;
        Ok(created)
    }

    /// Recomputes the pricing quote for the attempt's current selections.
    pub fn quote(&self, attempt: &CheckoutAttempt) -> PricingQuote {
        self.pricing.quote(
            &attempt.cart,
            attempt.selection.shipping_method,
            &self.pricing_config,
        )
    }

    /// Places the order. Idempotency-guarded: while a submission is in
    /// flight (or the attempt already progressed past submission) the
    /// call is a no-op and never issues a second order creation.
    #[instrument(skip(self, attempt), fields(attempt_id = %attempt.id))]
    pub async fn place_order(&self, attempt: &mut CheckoutAttempt) -> Result<Placement, ServiceError> {
        match attempt.state {
            CheckoutState::Review => {}
            CheckoutState::Submitting => {
                warn!("place_order re-entered while submitting; ignoring");
                return Ok(Placement::InFlight);
            }
            CheckoutState::AwaitingGatewayConfirmation => {
                let capture = attempt.capture.clone().ok_or_else(|| {
                    ServiceError::InternalError("awaiting capture without a capture request".into())
                })?;
                return Ok(Placement::AwaitingCapture(capture));
            }
            state if state.is_terminal() => {
                let confirmation = self.recorded_confirmation(attempt)?;
                return Ok(Placement::Confirmed(confirmation));
            }
            other => {
                return Err(ServiceError::InvalidOperation(format!(
                    "cannot place order from {}",
                    other
                )))
            }
        }

        let (address, payment_method) = attempt.validate_for_submission()?;
        let billing_address_id = attempt
            .selection
            .billing_address_id()
            .ok_or_else(|| ServiceError::ValidationError("no billing address".into()))?;

        attempt.state = CheckoutState::Submitting;

        let request = CreateOrderRequest {
            shipping_address_id: address.id,
            billing_address_id,
            payment_method,
            shipping_method: attempt.selection.shipping_method,
        };

        let order = match self.orders.create_order(&request).await {
            Ok(order) => order,
            Err(err) => {
                // Surfaced verbatim; the user re-initiates from Review on
                // a fresh attempt. No automatic retry.
                attempt.state = CheckoutState::Failed;
                attempt.confirmation = Some(failure_confirmation(
                    None,
                    Some(payment_method),
                    err.to_string(),
                ));
                return Err(err);
            }
        };

        info!(order_id = %order.order_id, order_number = %order.order_number, "order created");
        self.events
            .send(Event::OrderCreated {
                attempt_id: attempt.id,
                order_id: order.order_id,
            })
            .await;
        attempt.order = Some(order.clone());

        match payment_method {
            PaymentMethod::Cod => {
                let confirmation = self.settle(attempt, order, PaymentMethod::Cod, None).await;
                Ok(Placement::Confirmed(confirmation))
            }
            PaymentMethod::Gateway => match self.reconciliation.begin(&order, &address).await {
                Ok((gateway_order, capture)) => {
                    attempt.gateway_order = Some(gateway_order);
                    attempt.capture = Some(capture.clone());
                    attempt.state = CheckoutState::AwaitingGatewayConfirmation;
                    Ok(Placement::AwaitingCapture(capture))
                }
                Err(err) => {
                    // The storefront order exists but the client cannot
                    // retry this attempt; it stays pending for manual
                    // reconciliation.
                    attempt.state = CheckoutState::Failed;
                    attempt.confirmation = Some(failure_confirmation(
                        Some(&order),
                        Some(PaymentMethod::Gateway),
                        GATEWAY_INIT_FAILED_MESSAGE.to_string(),
                    ));
                    Err(err)
                }
            },
        }
    }

    /// Capture widget success callback: verify with the order backend.
    /// Verification, not capture, is what marks the order paid.
    #[instrument(skip(self, attempt, signature), fields(attempt_id = %attempt.id))]
    pub async fn capture_succeeded(
        &self,
        attempt: &mut CheckoutAttempt,
        gateway_payment_ref: String,
        signature: String,
    ) -> Result<Confirmation, ServiceError> {
        let Some((order, gateway_order)) = self.pending_capture(attempt)? else {
            return self.recorded_confirmation(attempt);
        };

        match self
            .reconciliation
            .reconcile_success(&order, &gateway_order, &gateway_payment_ref, &signature)
            .await
        {
            Ok(()) => {
                let confirmation = self
                    .settle(
                        attempt,
                        order,
                        PaymentMethod::Gateway,
                        Some(gateway_payment_ref),
                    )
                    .await;
                Ok(confirmation)
            }
            Err(err) => {
                warn!(order_id = %order.order_id, error = %err, "payment verification failed");
                self.reconciliation
                    .reconcile_verification_failure(&order, &gateway_order)
                    .await;
                attempt.state = CheckoutState::Failed;
                let confirmation = failure_confirmation(
                    Some(&order),
                    Some(PaymentMethod::Gateway),
                    VERIFICATION_FAILED_MESSAGE.to_string(),
                );
                attempt.confirmation = Some(confirmation.clone());
                Ok(confirmation)
            }
        }
    }

    /// Capture widget dismiss callback: the user closed the widget. Not
    /// an error; the cart is preserved for a repeat attempt.
    #[instrument(skip(self, attempt), fields(attempt_id = %attempt.id))]
    pub async fn capture_dismissed(
        &self,
        attempt: &mut CheckoutAttempt,
    ) -> Result<Confirmation, ServiceError> {
        let Some((order, gateway_order)) = self.pending_capture(attempt)? else {
            return self.recorded_confirmation(attempt);
        };

        self.reconciliation
            .reconcile_dismissed(&order, &gateway_order)
            .await;

        attempt.state = CheckoutState::Cancelled;
        let confirmation = failure_confirmation(
            Some(&order),
            Some(PaymentMethod::Gateway),
            CANCELLED_MESSAGE.to_string(),
        );
        attempt.confirmation = Some(confirmation.clone());
        self.events
            .send(Event::CheckoutCancelled {
                attempt_id: attempt.id,
                order_id: order.order_id,
            })
            .await;
        Ok(confirmation)
    }

    /// Capture widget failure callback (e.g. card declined).
    #[instrument(skip(self, attempt), fields(attempt_id = %attempt.id))]
    pub async fn capture_failed(
        &self,
        attempt: &mut CheckoutAttempt,
        error_code: Option<String>,
        error_description: Option<String>,
    ) -> Result<Confirmation, ServiceError> {
        let Some((order, gateway_order)) = self.pending_capture(attempt)? else {
            return self.recorded_confirmation(attempt);
        };

        self.reconciliation
            .reconcile_failure(&order, &gateway_order, error_code, error_description.clone())
            .await;

        attempt.state = CheckoutState::Failed;
        let message = match error_description {
            Some(desc) => format!("Payment not completed: {}", desc),
            None => "Payment not completed.".to_string(),
        };
        let confirmation =
            failure_confirmation(Some(&order), Some(PaymentMethod::Gateway), message);
        attempt.confirmation = Some(confirmation.clone());
        Ok(confirmation)
    }

    /// First-event-wins guard for the three mutually exclusive capture
    /// callbacks. Returns the pending order/gateway pair if no terminal
    /// outcome was recorded yet; `None` for a late duplicate.
    fn pending_capture(
        &self,
        attempt: &CheckoutAttempt,
    ) -> Result<Option<(PlacedOrder, GatewayOrder)>, ServiceError> {
        match attempt.state {
            CheckoutState::AwaitingGatewayConfirmation => {
                let order = attempt.order.clone().ok_or_else(|| {
                    ServiceError::InternalError("awaiting capture without an order".into())
                })?;
                let gateway_order = attempt.gateway_order.clone().ok_or_else(|| {
                    ServiceError::InternalError("awaiting capture without a gateway order".into())
                })?;
                Ok(Some((order, gateway_order)))
            }
            state if state.is_terminal() => {
                warn!(attempt_id = %attempt.id, %state, "capture event after terminal outcome; ignoring");
                Ok(None)
            }
            other => Err(ServiceError::InvalidOperation(format!(
                "no capture in progress for attempt in {}",
                other
            ))),
        }
    }

    fn recorded_confirmation(
        &self,
        attempt: &CheckoutAttempt,
    ) -> Result<Confirmation, ServiceError> {
        attempt
            .confirmation
            .clone()
            .ok_or_else(|| ServiceError::InternalError("terminal attempt without confirmation".into()))
    }

    /// Settlement: shipment initiation (best-effort), cart reset, and the
    /// final confirmation record. The only path that clears the cart.
    async fn settle(
        &self,
        attempt: &mut CheckoutAttempt,
        order: PlacedOrder,
        payment_method: PaymentMethod,
        payment_id: Option<String>,
    ) -> Confirmation {
        self.shipments.request_shipment(order.order_id).await;

        if let Err(err) = self.orders.delete_cart().await {
            warn!(order_id = %order.order_id, error = %err, "cart reset failed after settlement");
        } else {
            self.events
                .send(Event::CartCleared {
                    attempt_id: attempt.id,
                })
                .await;
        }

        attempt.state = CheckoutState::Settled;
        let confirmation = Confirmation {
            success: true,
            order_id: Some(order.order_id),
            order_number: Some(order.order_number.clone()),
            total: Some(order.total),
            payment_method: Some(payment_method),
            payment_id,
            message: None,
        };
        attempt.confirmation = Some(confirmation.clone());

        self.events
            .send(Event::CheckoutSettled {
                attempt_id: attempt.id,
                order_id: order.order_id,
            })
            .await;
        info!(order_id = %order.order_id, %payment_method, "checkout settled");
        confirmation
    }
}

fn failure_confirmation(
    order: Option<&PlacedOrder>,
    payment_method: Option<PaymentMethod>,
    message: String,
) -> Confirmation {
    Confirmation {
        success: false,
        order_id: order.map(|o| o.order_id),
        order_number: order.map(|o| o.order_number.clone()),
        total: order.map(|o| o.total),
        payment_method,
        payment_id: None,
        message: Some(message),
    }
}

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    clients::{FailPaymentRequest, OrderServiceApi, PaymentGatewayApi, VerifyPaymentRequest},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        minor_units, Address, CaptureRequest, CapturePrefill, FailureReason, GatewayOrder,
        PlacedOrder,
    },
};

/// Coordinates gateway-order creation and reconciles capture outcomes
/// with the order backend.
///
/// Exactly one terminal outcome per attempt is enforced by the checkout
/// state machine; this service never issues a conflicting verify/fail
/// call once a terminal outcome has been recorded. The backend keys
/// verify/fail idempotently on (order id, gateway payment ref).
#[derive(Clone)]
pub struct PaymentReconciliationService {
    orders: Arc<dyn OrderServiceApi>,
    gateway: Arc<dyn PaymentGatewayApi>,
    events: EventSender,
}

impl PaymentReconciliationService {
    pub fn new(
        orders: Arc<dyn OrderServiceApi>,
        gateway: Arc<dyn PaymentGatewayApi>,
        events: EventSender,
    ) -> Self {
        Self {
            orders,
            gateway,
            events,
        }
    }

    /// Creates the gateway order and builds the capture-widget seed.
    /// The gateway amount must equal the order total in minor units.
    #[instrument(skip(self, address), fields(order_id = %order.order_id))]
    pub async fn begin(
        &self,
        order: &PlacedOrder,
        address: &Address,
    ) -> Result<(GatewayOrder, CaptureRequest), ServiceError> {
        let gateway_order = self.gateway.create_gateway_order(order.order_id).await?;

        let expected = minor_units(order.total).ok_or_else(|| {
            ServiceError::InternalError(format!("order total {} out of range", order.total))
        })?;
        if gateway_order.amount_minor != expected {
            return Err(ServiceError::GatewayInitFailed(format!(
                "gateway amount {} does not match order total {}",
                gateway_order.amount_minor, expected
            )));
        }

        self.events
            .send(Event::GatewayOrderCreated {
                order_id: order.order_id,
                gateway_order_ref: gateway_order.gateway_order_ref.clone(),
            })
            .await;

        let capture = CaptureRequest {
            gateway_key: gateway_order.gateway_key.clone(),
            amount_minor: gateway_order.amount_minor,
            currency: gateway_order.currency.clone(),
            gateway_order_ref: gateway_order.gateway_order_ref.clone(),
            prefill: CapturePrefill {
                name: address.name.clone(),
                phone: address.phone.clone(),
            },
        };
        Ok((gateway_order, capture))
    }

    /// Verifies a captured payment with the order backend. Verification
    /// is the sole authority for marking the order paid; client-side
    /// capture success on its own never flips order state.
    #[instrument(skip(self, signature), fields(order_id = %order.order_id))]
    pub async fn reconcile_success(
        &self,
        order: &PlacedOrder,
        gateway_order: &GatewayOrder,
        gateway_payment_ref: &str,
        signature: &str,
    ) -> Result<(), ServiceError> {
        self.orders
            .verify_payment(&VerifyPaymentRequest {
                order_id: order.order_id,
                gateway_order_ref: gateway_order.gateway_order_ref.clone(),
                gateway_payment_ref: gateway_payment_ref.to_string(),
                signature: signature.to_string(),
            })
            .await?;

        self.events
            .send(Event::PaymentVerified {
                order_id: order.order_id,
                gateway_payment_ref: gateway_payment_ref.to_string(),
            })
            .await;
        info!(order_id = %order.order_id, "payment verified");
        Ok(())
    }

    /// Notifies the backend of a user dismissal. Best-effort: a failed
    /// notification is logged and the local outcome stands.
    #[instrument(skip(self), fields(order_id = %order.order_id))]
    pub async fn reconcile_dismissed(&self, order: &PlacedOrder, gateway_order: &GatewayOrder) {
        self.fail_best_effort(
            order,
            gateway_order,
            FailureReason::CancelledByUser,
            None,
            None,
        )
        .await;
    }

    /// Notifies the backend that a captured payment could not be verified.
    /// The distinct reason is what lets it route the order to refund
    /// investigation rather than plain payment failure.
    #[instrument(skip(self), fields(order_id = %order.order_id))]
    pub async fn reconcile_verification_failure(
        &self,
        order: &PlacedOrder,
        gateway_order: &GatewayOrder,
    ) {
        self.fail_best_effort(
            order,
            gateway_order,
            FailureReason::VerificationFailed,
            None,
            None,
        )
        .await;

        self.events
            .send(Event::PaymentFailed {
                order_id: order.order_id,
                reason: FailureReason::VerificationFailed,
            })
            .await;
    }

    /// Notifies the backend of a gateway-reported capture failure.
    #[instrument(skip(self), fields(order_id = %order.order_id))]
    pub async fn reconcile_failure(
        &self,
        order: &PlacedOrder,
        gateway_order: &GatewayOrder,
        error_code: Option<String>,
        error_description: Option<String>,
    ) {
        self.fail_best_effort(
            order,
            gateway_order,
            FailureReason::PaymentFailed,
            error_code,
            error_description,
        )
        .await;

        self.events
            .send(Event::PaymentFailed {
                order_id: order.order_id,
                reason: FailureReason::PaymentFailed,
            })
            .await;
    }

    async fn fail_best_effort(
        &self,
        order: &PlacedOrder,
        gateway_order: &GatewayOrder,
        reason: FailureReason,
        error_code: Option<String>,
        error_description: Option<String>,
    ) {
        let request = FailPaymentRequest {
            order_id: order.order_id,
            gateway_order_ref: gateway_order.gateway_order_ref.clone(),
            reason,
            error_code,
            error_description,
        };
        if let Err(err) = self.orders.fail_payment(&request).await {
            warn!(
                order_id = %order.order_id,
                %reason,
                error = %err,
                "fail-payment notification did not reach the order backend"
            );
        }
    }
}

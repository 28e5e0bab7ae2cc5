use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::FailureReason;

/// Events emitted by the checkout flow. Consumed by the logging processor;
/// event delivery is best-effort and never affects checkout outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CheckoutStarted {
        attempt_id: Uuid,
    },
    OrderCreated {
        attempt_id: Uuid,
        order_id: Uuid,
    },
    GatewayOrderCreated {
        order_id: Uuid,
        gateway_order_ref: String,
    },
    PaymentVerified {
        order_id: Uuid,
        gateway_payment_ref: String,
    },
    PaymentFailed {
        order_id: Uuid,
        reason: FailureReason,
    },
    CheckoutCancelled {
        attempt_id: Uuid,
        order_id: Uuid,
    },
    CheckoutSettled {
        attempt_id: Uuid,
        order_id: Uuid,
    },
    ShipmentRequested {
        order_id: Uuid,
    },
    CartCleared {
        attempt_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, logging (not propagating) delivery failures.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("failed to send event: {}", e);
        }
    }
}

/// Creates a connected sender/receiver pair with a bounded buffer.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Spawned from `main`.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::PaymentFailed { order_id, reason } => {
                warn!(%order_id, %reason, "payment failed");
            }
            other => {
                info!(event = ?other, "checkout event");
            }
        }
    }
}

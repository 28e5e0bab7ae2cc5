use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    clients::ShipmentApi,
    events::{Event, EventSender},
    models::PackageDimensions,
};

/// Best-effort shipment initiation. Triggered only after settlement;
/// failures are logged and swallowed, never blocking or reversing the
/// order.
#[derive(Clone)]
pub struct ShipmentService {
    api: Arc<dyn ShipmentApi>,
    package: PackageDimensions,
    events: EventSender,
}

impl ShipmentService {
    pub fn new(api: Arc<dyn ShipmentApi>, package: PackageDimensions, events: EventSender) -> Self {
        Self {
            api,
            package,
            events,
        }
    }

    /// Requests a shipment with the configured package dimensions.
    #[instrument(skip(self))]
    pub async fn request_shipment(&self, order_id: Uuid) {
        match self.api.create_shipment(order_id, &self.package).await {
            Ok(()) => {
                info!(%order_id, "shipment requested");
                self.events.send(Event::ShipmentRequested { order_id }).await;
            }
            Err(err) => {
                // Shipment can be created manually later.
                warn!(%order_id, error = %err, "shipment creation failed; order confirmation proceeds");
            }
        }
    }
}

use std::{net::SocketAddr, sync::Arc};

use tokio::signal;
use tracing::info;

use checkout_api as api;

use api::{
    clients::{HttpOrderServiceClient, HttpPaymentGatewayClient, HttpShipmentClient},
    models::PackageDimensions,
    services::{CheckoutService, PaymentReconciliationService, ShipmentService},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Collaborator clients
    let orders: Arc<dyn api::clients::OrderServiceApi> =
        Arc::new(HttpOrderServiceClient::from_config(&cfg.order_service)?);
    let gateway: Arc<dyn api::clients::PaymentGatewayApi> =
        Arc::new(HttpPaymentGatewayClient::from_config(&cfg.gateway)?);
    let shipment_api: Arc<dyn api::clients::ShipmentApi> =
        Arc::new(HttpShipmentClient::from_config(&cfg.shipment)?);

    // Init events
    let (event_sender, event_rx) = api::events::channel(1024);
    tokio::spawn(api::events::process_events(event_rx));

    // Build services
    let reconciliation =
        PaymentReconciliationService::new(orders.clone(), gateway, event_sender.clone());
    let shipments = ShipmentService::new(
        shipment_api,
        PackageDimensions::from(&cfg.shipment.package),
        event_sender.clone(),
    );
    let checkout = Arc::new(CheckoutService::new(
        orders,
        reconciliation,
        shipments,
        cfg.pricing.clone(),
        event_sender,
    ));

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    let retention = chrono::Duration::seconds(cfg.attempt_retention_secs as i64);
    let state = Arc::new(AppState::new(cfg, checkout));

    // Sweep finished attempts once their retention window passes
    let attempts = state.attempts.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            tick.tick().await;
            let evicted = attempts.evict_terminal(retention);
            if evicted > 0 {
                info!(evicted, "evicted finished checkout attempts");
            }
        }
    });

    let app = api::app_router(state);

    info!("checkout-api listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

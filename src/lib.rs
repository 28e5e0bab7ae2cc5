//! Checkout orchestration service.
//!
//! Converts a cart snapshot into a confirmed order and drives the
//! multi-step payment lifecycle against an external payment gateway,
//! keeping cart, order, and shipment initiation consistent across
//! network failure, user cancellation, and out-of-order callbacks.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod clients;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod services;
pub mod sessions;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::services::CheckoutService;
use crate::sessions::AttemptStore;

/// Services bundle shared by the handler layer.
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
}

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub services: AppServices,
    pub attempts: AttemptStore,
}

impl AppState {
    pub fn new(config: config::AppConfig, checkout: Arc<CheckoutService>) -> Self {
        Self {
            config,
            services: AppServices { checkout },
            attempts: AttemptStore::new(),
        }
    }
}

/// Builds the application router.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/v1/checkout", handlers::checkout::checkout_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

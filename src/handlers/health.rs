use axum::response::Response;
use serde_json::json;

use crate::handlers::common::success_response;

/// Liveness probe.
pub async fn health() -> Response {
    success_response(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

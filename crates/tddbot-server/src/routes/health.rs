use axum::Json;
use serde_json::{json, Value};

/// GET /: service info.
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "tddbot webhook dispatcher",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": ["/webhook/linear", "/slack/events", "/health"],
    }))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "webhook_dispatcher" }))
}

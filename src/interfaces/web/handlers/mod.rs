pub mod channels;
pub mod generate;
pub mod webhook;

use axum::Json;
use serde_json::json;

pub async fn health_endpoint() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

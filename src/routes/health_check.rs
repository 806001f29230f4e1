use axum::Json;
use serde_json::{json, Value};

use crate::db::{backend_name, database_url};

/// Liveness probe. Reports the configured backend without touching the
/// videos table.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "StreamHub Video Platform",
        "version": env!("CARGO_PKG_VERSION"),
        "database": backend_name(&database_url()),
        "environment": std::env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string()),
    }))
}

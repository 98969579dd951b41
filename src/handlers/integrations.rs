use axum::response::Json;
use serde_json::{json, Value};

/// GET /api/integrations/ping - API key health check for service clients
pub async fn ping() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "pong": true,
            "timestamp": chrono::Utc::now(),
        }
    }))
}

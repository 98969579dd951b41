use axum::response::Json;
use serde_json::{json, Value};

/// GET / - service description
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Chat API (Rust)",
            "version": version,
            "description": "Group chat API with declarative route guards and response caching",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "messages": "/api/groups/:groupId/messages (group members)",
                "own_message": "/api/messages/:messageId (message sender)",
                "moderation": "/api/groups/:groupId/messages/:messageId (group admins)",
                "admin": "/api/admin/stats (admin role + stats:read)",
                "integrations": "/api/integrations/ping (API key)",
            }
        }
    }))
}

/// GET /health - liveness check
pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
        }
    }))
}

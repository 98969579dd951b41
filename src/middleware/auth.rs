use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::CallerIdentity;
use crate::error::ApiError;

pub const CALLER_HEADER: &str = "x-caller";

/// Development stand-in for the upstream authentication stage.
///
/// Reads a JSON caller identity from the `x-caller` header and injects it into
/// request extensions. Requests without the header stay anonymous; guards
/// decide whether that is acceptable. Never enable outside trusted networks:
/// the header is taken at face value.
pub async fn trusted_identity_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(identity) = extract_identity_from_headers(request.headers())? {
        tracing::debug!("Caller identity attached: {}", identity.id);
        request.extensions_mut().insert(identity);
    }

    Ok(next.run(request).await)
}

/// Parse the caller identity header, if present
fn extract_identity_from_headers(headers: &HeaderMap) -> Result<Option<CallerIdentity>, ApiError> {
    let Some(raw) = headers.get(CALLER_HEADER) else {
        return Ok(None);
    };

    let raw = raw
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid x-caller header format"))?;

    let identity: CallerIdentity = serde_json::from_str(raw)
        .map_err(|e| ApiError::unauthorized(format!("Invalid x-caller identity: {}", e)))?;

    if identity.id.trim().is_empty() {
        return Err(ApiError::unauthorized("Caller identity must have an id"));
    }

    Ok(Some(identity))
}

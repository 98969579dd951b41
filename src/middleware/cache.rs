use std::sync::Arc;

use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;

use crate::cache::ResponseCacheInterceptor;
use crate::error::ApiError;
use crate::middleware::guard::describe;
use crate::policy::RoutePolicy;
use crate::request::RequestDescriptor;

pub const CACHE_STATUS_HEADER: &str = "x-cache";

#[derive(Clone)]
pub struct RouteCache {
    pub policy: Arc<RoutePolicy>,
    pub interceptor: Arc<ResponseCacheInterceptor>,
    pub max_body_bytes: usize,
}

/// Serve the route from the response cache, or run the handler and cache its JSON body.
///
/// Only `200 OK` JSON responses are cache candidates; anything else passes
/// through untouched, exactly like a handler error.
pub async fn cache_middleware(
    State(route): State<RouteCache>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let descriptor = match parts.extensions.get::<RequestDescriptor>() {
        Some(descriptor) => descriptor.clone(),
        None => describe(&mut parts).await,
    };
    let request = Request::from_parts(parts, body);
    let max_body_bytes = route.max_body_bytes;

    let result = route
        .interceptor
        .intercept_with_outcome(&descriptor, route.policy.cache.as_ref(), move || async move {
            let response = next.run(request).await;
            cacheable_body(response, max_body_bytes).await
        })
        .await;

    match result {
        Ok((value, outcome)) => {
            let mut response = Json(value).into_response();
            response
                .headers_mut()
                .insert(CACHE_STATUS_HEADER, HeaderValue::from_static(outcome.as_str()));
            response
        }
        Err(response) => response,
    }
}

/// Split a handler response into a cacheable JSON value or a pass-through response
async fn cacheable_body(response: Response, max_body_bytes: usize) -> Result<Value, Response> {
    if response.status() != StatusCode::OK {
        return Err(response);
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false);

    let too_large = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())
        .map(|length| length > max_body_bytes)
        .unwrap_or(false);

    if !is_json || too_large {
        return Err(response);
    }

    // Json responses carry no content-length yet, so the limit is enforced after buffering
    let (parts, body) = response.into_parts();
    let bytes = match body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Failed to buffer response body for caching: {}", e);
            return Err(ApiError::internal_server_error("Failed to read response").into_response());
        }
    };

    if bytes.len() > max_body_bytes {
        tracing::debug!("Response of {} bytes exceeds cache limit, not cached", bytes.len());
        return Err(Response::from_parts(parts, Body::from(bytes)));
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => Ok(value),
        Err(_) => Err(Response::from_parts(parts, Body::from(bytes))),
    }
}

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, MatchedPath, Path, Request, State},
    http::request::Parts,
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
    RequestPartsExt,
};

use crate::auth::CallerIdentity;
use crate::cache::ResponseCacheInterceptor;
use crate::error::ApiError;
use crate::guard::GuardChain;
use crate::middleware::cache::{cache_middleware, RouteCache};
use crate::policy::RoutePolicy;
use crate::request::{parse_query, LoadedResource, RequestDescriptor};

/// Guard chain and policy bound to one route at registration time
#[derive(Clone)]
pub struct RouteGuard {
    pub policy: Arc<RoutePolicy>,
    pub chain: Arc<GuardChain>,
}

impl RouteGuard {
    pub fn new(policy: Arc<RoutePolicy>, chain: GuardChain) -> Self {
        Self {
            policy,
            chain: Arc::new(chain),
        }
    }
}

/// Attach the guard chain, and the response cache when the policy asks for
/// one, to a single-method router.
///
/// The guard runs first; the cache only ever sees requests that passed it.
pub fn protect<S>(
    router: MethodRouter<S>,
    guard: RouteGuard,
    interceptor: Option<Arc<ResponseCacheInterceptor>>,
    max_cached_body_bytes: usize,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let router = match (guard.policy.cache.is_some(), interceptor) {
        (true, Some(interceptor)) => {
            let cache = RouteCache {
                policy: guard.policy.clone(),
                interceptor,
                max_body_bytes: max_cached_body_bytes,
            };
            router.route_layer(from_fn_with_state(cache, cache_middleware))
        }
        _ => router,
    };

    router.route_layer(from_fn_with_state(guard, guard_middleware))
}

/// Evaluate the route's guard chain, short-circuiting with the first denial
pub async fn guard_middleware(
    State(route): State<RouteGuard>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();
    let descriptor = describe(&mut parts).await;

    route.chain.evaluate(&descriptor, &route.policy)?;

    // Shared with the cache layer so the descriptor is built once
    parts.extensions.insert(descriptor);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Build the request descriptor from axum request parts
pub async fn describe(parts: &mut Parts) -> RequestDescriptor {
    let params = parts
        .extract::<Path<HashMap<String, String>>>()
        .await
        .map(|Path(params)| params)
        .unwrap_or_default();

    let route_path = parts
        .extensions
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let client_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    RequestDescriptor {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        route_path,
        query: parse_query(parts.uri.query()),
        params,
        headers: parts.headers.clone(),
        client_addr,
        identity: parts.extensions.get::<CallerIdentity>().cloned(),
        resource: parts.extensions.get::<LoadedResource>().cloned(),
    }
}

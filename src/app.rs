use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, MethodRouter},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::{CacheStore, MemoryCacheStore, ResponseCacheInterceptor};
use crate::clock::Clock;
use crate::config::{AppConfig, SecurityConfig};
use crate::guard::{
    ApiKeyGuard, AuthenticationGuard, Guard, GuardChain, GroupAdminGuard, GroupMemberGuard,
    PermissionGuard, RateLimitGuard, RateLimitStore, ResourceOwnerGuard, RoleGuard, ThrottleGuard,
    ThrottleStore,
};
use crate::handlers::{admin, integrations, messages, public};
use crate::maintenance::{spawn_sweepers, SweepSchedule, Sweepers};
use crate::middleware::{load_message_middleware, protect, trusted_identity_middleware, RouteGuard, CALLER_HEADER};
use crate::policy::{PolicyRegistry, RoutePolicy};
use crate::services::MessageBoard;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct Services {
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub policies: Arc<PolicyRegistry>,
    pub rate_limits: Arc<RateLimitStore>,
    pub throttles: Arc<ThrottleStore>,
    pub cache_store: Arc<MemoryCacheStore>,
    pub board: Arc<MessageBoard>,
}

impl Services {
    pub fn new(config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            cache_store: Arc::new(MemoryCacheStore::new(clock.clone())),
            clock,
            policies: Arc::new(PolicyRegistry::new()),
            rate_limits: Arc::new(RateLimitStore::new()),
            throttles: Arc::new(ThrottleStore::new()),
            board: Arc::new(MessageBoard::new()),
        }
    }

    /// Replace the policy registry, typically with file overrides already applied
    pub fn with_policies(mut self, policies: PolicyRegistry) -> Self {
        self.policies = Arc::new(policies);
        self
    }

    /// Start the background sweepers for the in-memory stores
    pub fn spawn_sweepers(&self) -> Sweepers {
        spawn_sweepers(
            SweepSchedule {
                rate_limit_period: std::time::Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                throttle_interval_ms: self.config.rate_limit.throttle_interval_ms,
                cache_period: std::time::Duration::from_secs(self.config.cache.sweep_interval_secs),
            },
            self.clock.clone(),
            self.rate_limits.clone(),
            self.throttles.clone(),
            self.cache_store.clone(),
        )
    }
}

/// Guard instances shared by every route chain
struct Guards {
    authentication: Arc<dyn Guard>,
    role: Arc<dyn Guard>,
    permission: Arc<dyn Guard>,
    group_member: Arc<dyn Guard>,
    group_admin: Arc<dyn Guard>,
    owner: Arc<dyn Guard>,
    rate_limit: Arc<dyn Guard>,
    throttle: Arc<dyn Guard>,
    api_key: Arc<dyn Guard>,
}

impl Guards {
    fn new(services: &Services) -> Self {
        let config = &services.config;
        Self {
            authentication: Arc::new(AuthenticationGuard),
            role: Arc::new(RoleGuard),
            permission: Arc::new(PermissionGuard),
            group_member: Arc::new(GroupMemberGuard::default()),
            group_admin: Arc::new(GroupAdminGuard::default()),
            owner: Arc::new(ResourceOwnerGuard::default()),
            rate_limit: Arc::new(RateLimitGuard::new(services.rate_limits.clone(), services.clock.clone())),
            throttle: Arc::new(
                ThrottleGuard::new(services.throttles.clone(), services.clock.clone())
                    .with_interval_ms(config.rate_limit.throttle_interval_ms),
            ),
            api_key: Arc::new(ApiKeyGuard::new(
                config.security.api_key_header.clone(),
                config.security.api_keys.iter().cloned(),
            )),
        }
    }

    fn chain(&self, guards: &[&Arc<dyn Guard>]) -> GuardChain {
        guards
            .iter()
            .fold(GuardChain::new(), |chain, guard| chain.with(Arc::clone(guard)))
    }
}

/// Binds route policies from the registry to guarded method routers
struct RouteBuilder {
    policies: PolicyRegistry,
    interceptor: Arc<ResponseCacheInterceptor>,
    max_cached_body_bytes: usize,
}

impl RouteBuilder {
    fn guarded(
        &mut self,
        method: Method,
        path: &str,
        default_policy: RoutePolicy,
        chain: GuardChain,
        router: MethodRouter<Services>,
    ) -> MethodRouter<Services> {
        let policy = self.policies.register(method.as_str(), path, default_policy);
        tracing::debug!("Route {} {} guarded by {:?}", method, path, chain.names());
        protect(
            router,
            RouteGuard::new(policy, chain),
            Some(self.interceptor.clone()),
            self.max_cached_body_bytes,
        )
    }
}

pub fn app(services: Services) -> Router {
    let config = services.config.clone();
    let guards = Guards::new(&services);

    let cache_store: Arc<dyn CacheStore> = services.cache_store.clone();
    let interceptor = ResponseCacheInterceptor::new(cache_store)
        .with_admission(config.cache.admission)
        .with_default_ttl_secs(config.cache.default_ttl_secs);

    let mut routes = RouteBuilder {
        policies: (*services.policies).clone(),
        interceptor: Arc::new(interceptor),
        max_cached_body_bytes: config.api.max_cached_body_bytes,
    };

    let root = routes.guarded(
        Method::GET,
        "/",
        RoutePolicy::public(),
        guards.chain(&[&guards.authentication]),
        get(public::root),
    );
    let health = routes.guarded(
        Method::GET,
        "/health",
        RoutePolicy::public(),
        guards.chain(&[&guards.authentication]),
        get(public::health),
    );

    let group_messages = "/api/groups/:groupId/messages";
    let list_messages = routes.guarded(
        Method::GET,
        group_messages,
        RoutePolicy::protected().with_cache(60),
        guards.chain(&[&guards.authentication, &guards.group_member]),
        get(messages::list),
    );
    let post_message = routes.guarded(
        Method::POST,
        group_messages,
        RoutePolicy::protected().with_rate_limit(30, 60_000),
        guards.chain(&[
            &guards.authentication,
            &guards.group_member,
            &guards.rate_limit,
            &guards.throttle,
        ]),
        post(messages::post),
    );

    // The loader sits outside the guard so the ownership check sees the message
    let delete_own = routes
        .guarded(
            Method::DELETE,
            "/api/messages/:messageId",
            RoutePolicy::protected(),
            guards.chain(&[&guards.authentication, &guards.owner]),
            delete(messages::delete_own),
        )
        .route_layer(from_fn_with_state(services.board.clone(), load_message_middleware));

    let moderate = routes.guarded(
        Method::DELETE,
        "/api/groups/:groupId/messages/:messageId",
        RoutePolicy::protected(),
        guards.chain(&[&guards.authentication, &guards.group_admin]),
        delete(messages::moderate),
    );

    let stats = routes.guarded(
        Method::GET,
        "/api/admin/stats",
        RoutePolicy::protected()
            .with_roles(["admin"])
            .with_permissions(["stats:read"]),
        guards.chain(&[&guards.authentication, &guards.role, &guards.permission]),
        get(admin::stats),
    );

    let ping = routes.guarded(
        Method::GET,
        "/api/integrations/ping",
        RoutePolicy::protected(),
        guards.chain(&[&guards.api_key]),
        get(integrations::ping),
    );

    tracing::info!("Registered {} route policies", routes.policies.len());
    let services = services.with_policies(routes.policies);

    let mut router = Router::new()
        // Public
        .route("/", root)
        .route("/health", health)
        // Group members
        .route(group_messages, list_messages.merge(post_message))
        // Message owners and group admins
        .route("/api/messages/:messageId", delete_own)
        .route("/api/groups/:groupId/messages/:messageId", moderate)
        // Role and permission gated
        .route("/api/admin/stats", stats)
        // Service clients
        .route("/api/integrations/ping", ping)
        .with_state(services);

    if config.security.trust_identity_header {
        tracing::warn!("Trusting {} identity header; do not expose this server publicly", CALLER_HEADER);
        router = router.layer(from_fn(trusted_identity_middleware));
    }

    if config.security.enable_cors {
        router = router.layer(cors_layer(&config.security));
    }

    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let mut headers = vec![
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(CALLER_HEADER),
    ];
    if let Ok(api_key_header) = HeaderName::from_bytes(security.api_key_header.as_bytes()) {
        headers.push(api_key_header);
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CallerIdentity;
    use crate::clock::ManualClock;
    use crate::middleware::CACHE_STATUS_HEADER;
    use crate::testing::settle;
    use axum::body::{self, Body};
    use axum::http::{HeaderMap, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        clock: ManualClock,
        services: Services,
    }

    fn test_app() -> TestApp {
        let clock = ManualClock::new(1_700_000_000_000);
        let mut config = AppConfig::development();
        config.api.enable_request_logging = false;
        config.security.api_keys = vec!["k-1".to_string()];

        let services = Services::new(config, Arc::new(clock.clone()));
        TestApp {
            router: app(services.clone()),
            clock,
            services,
        }
    }

    fn member(id: &str, group: &str) -> CallerIdentity {
        CallerIdentity::new(id).with_groups([group])
    }

    fn request(method: Method, uri: &str, caller: Option<&CallerIdentity>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder.header(CALLER_HEADER, serde_json::to_string(caller).unwrap());
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, value)
    }

    #[tokio::test]
    async fn test_public_routes_need_no_identity() {
        let app = test_app();
        let (status, _, body) = send(&app.router, request(Method::GET, "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");

        let (status, _, _) = send(&app.router, request(Method::GET, "/", None, None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_group_membership_required() {
        let app = test_app();
        let uri = "/api/groups/g-1/messages";

        let (status, _, body) = send(&app.router, request(Method::GET, uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Authentication required");

        let outsider = member("u-2", "g-2");
        let (status, _, body) = send(&app.router, request(Method::GET, uri, Some(&outsider), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not a member of this group");

        let alice = member("u-1", "g-1");
        let (status, _, _) = send(&app.router, request(Method::GET, uri, Some(&alice), None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_identity_header_rejected() {
        let app = test_app();
        let request = Request::builder()
            .uri("/health")
            .header(CALLER_HEADER, "{not json")
            .body(Body::empty())
            .unwrap();

        let (status, _, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_list_served_from_cache_on_second_call() {
        let app = test_app();
        let alice = member("u-1", "g-1");
        let uri = "/api/groups/g-1/messages";
        app.services.board.post("g-1", "u-1", "hello");

        let (status, headers, first) = send(&app.router, request(Method::GET, uri, Some(&alice), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CACHE_STATUS_HEADER], "MISS");
        settle().await;

        // Cached body is served even though the board changed
        app.services.board.post("g-1", "u-1", "second");
        let (_, headers, second) = send(&app.router, request(Method::GET, uri, Some(&alice), None)).await;
        assert_eq!(headers[CACHE_STATUS_HEADER], "HIT");
        assert_eq!(first, second);
        assert_eq!(second["data"].as_array().map(Vec::len), Some(1));

        assert!(app
            .services
            .cache_store
            .get("cache:GET:/api/groups/g-1/messages:user:u-1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_cache_keys_are_per_user() {
        let app = test_app();
        let uri = "/api/groups/g-1/messages";
        let alice = member("u-1", "g-1");
        let bob = member("u-2", "g-1");

        send(&app.router, request(Method::GET, uri, Some(&alice), None)).await;
        settle().await;

        let (_, headers, _) = send(&app.router, request(Method::GET, uri, Some(&bob), None)).await;
        assert_eq!(headers[CACHE_STATUS_HEADER], "MISS");
    }

    #[tokio::test]
    async fn test_oversized_response_passes_through_uncached() {
        let clock = ManualClock::new(1_700_000_000_000);
        let mut config = AppConfig::development();
        config.api.enable_request_logging = false;
        config.api.max_cached_body_bytes = 200;
        let services = Services::new(config, Arc::new(clock));
        let router = app(services.clone());

        for i in 0..5 {
            services.board.post("g-1", "u-1", &format!("message number {}", i));
        }

        let alice = member("u-1", "g-1");
        let uri = "/api/groups/g-1/messages";
        let (status, headers, body) = send(&router, request(Method::GET, uri, Some(&alice), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.get(CACHE_STATUS_HEADER).is_none());
        assert_eq!(body["data"].as_array().map(Vec::len), Some(5));

        settle().await;
        assert!(services.cache_store.is_empty());

        let (status, _, _) = send(&router, request(Method::GET, uri, Some(&alice), None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_post_is_throttled_per_route() {
        let app = test_app();
        let alice = member("u-1", "g-1");
        let bob = member("u-2", "g-2");

        let (status, _, body) = send(
            &app.router,
            request(Method::POST, "/api/groups/g-1/messages", Some(&alice), Some(json!({"body": "hi"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["senderId"], "u-1");

        // Another caller in another group shares the route signature
        let (status, _, body) = send(
            &app.router,
            request(Method::POST, "/api/groups/g-2/messages", Some(&bob), Some(json!({"body": "hey"}))),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["message"], "Request throttled, please slow down");

        app.clock.advance_ms(1_000);
        let (status, _, _) = send(
            &app.router,
            request(Method::POST, "/api/groups/g-2/messages", Some(&bob), Some(json!({"body": "hey"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_post_rate_limited_after_limit() {
        let app = test_app();
        let alice = member("u-1", "g-1");

        for _ in 0..30 {
            let (status, _, _) = send(
                &app.router,
                request(Method::POST, "/api/groups/g-1/messages", Some(&alice), Some(json!({"body": "hi"}))),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            app.clock.advance_ms(1_000);
        }

        let (status, _, body) = send(
            &app.router,
            request(Method::POST, "/api/groups/g-1/messages", Some(&alice), Some(json!({"body": "hi"}))),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["message"], "Too many requests, please try again later");

        app.clock.advance_ms(60_000);
        let (status, _, _) = send(
            &app.router,
            request(Method::POST, "/api/groups/g-1/messages", Some(&alice), Some(json!({"body": "hi"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_only_sender_deletes_own_message() {
        let app = test_app();
        let message = app.services.board.post("g-1", "u-1", "mine");
        let uri = format!("/api/messages/{}", message.id);

        let mallory = member("u-9", "g-1");
        let (status, _, body) = send(&app.router, request(Method::DELETE, &uri, Some(&mallory), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "You can only modify your own resources");

        let alice = member("u-1", "g-1");
        let (status, _, _) = send(&app.router, request(Method::DELETE, &uri, Some(&alice), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.services.board.get(&message.id).is_none());

        let (status, _, body) = send(&app.router, request(Method::DELETE, &uri, Some(&alice), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Resource not found");
    }

    #[tokio::test]
    async fn test_group_admin_moderates() {
        let app = test_app();
        let message = app.services.board.post("g-1", "u-1", "spam");
        let uri = format!("/api/groups/g-1/messages/{}", message.id);

        let alice = member("u-1", "g-1");
        let (status, _, body) = send(&app.router, request(Method::DELETE, &uri, Some(&alice), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Group admin rights required");

        let moderator = CallerIdentity::new("u-2").with_admin_groups(["g-1"]);
        let (status, _, _) = send(&app.router, request(Method::DELETE, &uri, Some(&moderator), None)).await;
        assert_eq!(status, StatusCode::OK);

        let wrong_group = format!("/api/groups/g-1/messages/{}", "missing");
        let (status, _, _) = send(&app.router, request(Method::DELETE, &wrong_group, Some(&moderator), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_stats_requires_role_and_permission() {
        let app = test_app();
        let uri = "/api/admin/stats";

        let user = CallerIdentity::new("u-1").with_permissions(["stats:read"]);
        let (status, _, body) = send(&app.router, request(Method::GET, uri, Some(&user), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Insufficient role");

        let admin = CallerIdentity::new("root").with_role("admin");
        let (status, _, body) = send(&app.router, request(Method::GET, uri, Some(&admin), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Insufficient permissions");

        let admin = admin.with_permissions(["stats:read"]);
        let (status, _, body) = send(&app.router, request(Method::GET, uri, Some(&admin), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["routePolicies"], 8);
    }

    #[tokio::test]
    async fn test_integration_ping_requires_api_key() {
        let app = test_app();
        let uri = "/api/integrations/ping";

        let (status, _, body) = send(&app.router, request(Method::GET, uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "API key is required");

        let wrong = Request::builder().uri(uri).header("x-api-key", "nope").body(Body::empty()).unwrap();
        let (status, _, body) = send(&app.router, wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid API key");

        let valid = Request::builder().uri(uri).header("x-api-key", "k-1").body(Body::empty()).unwrap();
        let (status, _, body) = send(&app.router, valid).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pong"], true);
    }

    #[tokio::test]
    async fn test_policy_override_makes_route_public() {
        let clock = ManualClock::new(0);
        let mut config = AppConfig::development();
        config.api.enable_request_logging = false;

        let mut policies = PolicyRegistry::new();
        policies
            .apply_yaml("\"GET /api/admin/stats\":\n  public: true\n")
            .unwrap();
        let router = app(Services::new(config, Arc::new(clock)).with_policies(policies));

        let (status, _, _) = send(&router, request(Method::GET, "/api/admin/stats", None, None)).await;
        assert_eq!(status, StatusCode::OK);
    }
}

pub mod auth;
pub mod cache;
pub mod guard;
pub mod load_message;
pub mod response;

pub use auth::{trusted_identity_middleware, CALLER_HEADER};
pub use cache::{cache_middleware, RouteCache, CACHE_STATUS_HEADER};
pub use guard::{guard_middleware, protect, RouteGuard};
pub use load_message::load_message_middleware;
pub use response::{ApiResponse, ApiResult};

// Guard chain deciding, per request, whether a handler may run
//
// Guards are AND-composed: evaluated in declaration order, the first denial
// becomes the request's terminal error.

pub mod api_key;
pub mod chain;
pub mod error;
pub mod group;
pub mod identity;
pub mod ownership;
pub mod rate_limit;
pub mod throttle;
pub mod traits;

pub use api_key::{ApiKeyGuard, API_KEY_HEADER};
pub use chain::GuardChain;
pub use error::GuardError;
pub use group::{GroupAdminGuard, GroupMemberGuard};
pub use identity::{AuthenticationGuard, PermissionGuard, RoleGuard};
pub use ownership::ResourceOwnerGuard;
pub use rate_limit::{RateLimitGuard, RateLimitStore};
pub use throttle::{ThrottleGuard, ThrottleStore};
pub use traits::Guard;

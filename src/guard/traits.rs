use crate::auth::CallerIdentity;
use crate::guard::error::GuardError;
use crate::policy::RoutePolicy;
use crate::request::RequestDescriptor;

/// A decision over a single request: allow (`Ok`) or deny with a reason.
///
/// Guards never suspend. State they keep (counters, timestamps) is updated
/// with per-key atomic operations so concurrent requests never tear it.
pub trait Guard: Send + Sync {
    /// Guard name for logging and debugging
    fn name(&self) -> &'static str;

    fn check(&self, request: &RequestDescriptor, policy: &RoutePolicy) -> Result<(), GuardError>;
}

/// Caller identity or `Unauthenticated`
pub(crate) fn require_identity(request: &RequestDescriptor) -> Result<&CallerIdentity, GuardError> {
    request
        .identity
        .as_ref()
        .ok_or_else(|| GuardError::unauthenticated("Authentication required"))
}

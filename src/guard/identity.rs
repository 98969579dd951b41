use crate::guard::error::GuardError;
use crate::guard::traits::{require_identity, Guard};
use crate::policy::RoutePolicy;
use crate::request::RequestDescriptor;

/// Requires a caller identity on every non-public route
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticationGuard;

impl Guard for AuthenticationGuard {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn check(&self, request: &RequestDescriptor, policy: &RoutePolicy) -> Result<(), GuardError> {
        if policy.public {
            return Ok(());
        }
        require_identity(request).map(|_| ())
    }
}

/// Caller's single role must match any of the route's required roles
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleGuard;

impl Guard for RoleGuard {
    fn name(&self) -> &'static str {
        "role"
    }

    fn check(&self, request: &RequestDescriptor, policy: &RoutePolicy) -> Result<(), GuardError> {
        if policy.public || policy.roles.is_empty() {
            return Ok(());
        }

        let identity = require_identity(request)?;
        if policy.roles.contains(&identity.role) {
            Ok(())
        } else {
            Err(GuardError::forbidden("Insufficient role"))
        }
    }
}

/// Caller must hold at least one of the route's required permissions
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionGuard;

impl Guard for PermissionGuard {
    fn name(&self) -> &'static str {
        "permission"
    }

    fn check(&self, request: &RequestDescriptor, policy: &RoutePolicy) -> Result<(), GuardError> {
        if policy.public || policy.permissions.is_empty() {
            return Ok(());
        }

        let identity = require_identity(request)?;
        let granted = policy
            .permissions
            .iter()
            .any(|permission| identity.permissions.contains(permission));

        if granted {
            Ok(())
        } else {
            Err(GuardError::forbidden("Insufficient permissions"))
        }
    }
}

use crate::guard::error::GuardError;
use crate::guard::traits::{require_identity, Guard};
use crate::policy::RoutePolicy;
use crate::request::RequestDescriptor;

/// Route parameters checked, in order, for the target message id
pub const DEFAULT_RESOURCE_PARAMS: &[&str] = &["messageId", "id"];

/// Caller must own the resource an earlier stage attached to the request.
///
/// A missing resource is reported as `Forbidden`, not as not-found; callers
/// cannot tell an absent message from someone else's.
#[derive(Debug, Clone)]
pub struct ResourceOwnerGuard {
    param_names: Vec<String>,
}

impl ResourceOwnerGuard {
    pub fn new<I, S>(param_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            param_names: param_names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for ResourceOwnerGuard {
    fn default() -> Self {
        Self::new(DEFAULT_RESOURCE_PARAMS.iter().copied())
    }
}

impl Guard for ResourceOwnerGuard {
    fn name(&self) -> &'static str {
        "resource_owner"
    }

    fn check(&self, request: &RequestDescriptor, policy: &RoutePolicy) -> Result<(), GuardError> {
        if policy.public {
            return Ok(());
        }

        let identity = require_identity(request)?;
        request
            .param_any(&self.param_names)
            .ok_or_else(|| GuardError::forbidden("Resource id is required"))?;

        let resource = request
            .resource
            .as_ref()
            .ok_or_else(|| GuardError::forbidden("Resource not found"))?;

        match resource.owner_key() {
            Some(owner) if owner == identity.id => Ok(()),
            _ => Err(GuardError::forbidden("You can only modify your own resources")),
        }
    }
}

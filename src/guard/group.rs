use crate::auth::CallerIdentity;
use crate::guard::error::GuardError;
use crate::guard::traits::{require_identity, Guard};
use crate::policy::RoutePolicy;
use crate::request::RequestDescriptor;

/// Route parameters checked, in order, for the target group id
pub const DEFAULT_GROUP_PARAMS: &[&str] = &["groupId", "id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupRight {
    Member,
    Admin,
}

impl GroupRight {
    fn holds(self, identity: &CallerIdentity, group_id: &str) -> bool {
        match self {
            GroupRight::Member => identity.is_member_of(group_id),
            GroupRight::Admin => identity.is_admin_of(group_id),
        }
    }
}

fn check_group(
    request: &RequestDescriptor,
    policy: &RoutePolicy,
    param_names: &[String],
    right: GroupRight,
) -> Result<(), GuardError> {
    if policy.public {
        return Ok(());
    }

    let identity = require_identity(request)?;
    let group_id = request
        .param_any(param_names)
        .ok_or_else(|| GuardError::forbidden("Group id is required"))?;

    if right.holds(identity, group_id) {
        Ok(())
    } else {
        match right {
            GroupRight::Member => Err(GuardError::forbidden("Not a member of this group")),
            GroupRight::Admin => Err(GuardError::forbidden("Group admin rights required")),
        }
    }
}

/// Caller must belong to the group named by the route
#[derive(Debug, Clone)]
pub struct GroupMemberGuard {
    param_names: Vec<String>,
}

impl GroupMemberGuard {
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

impl Default for GroupMemberGuard {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_PARAMS.iter().copied())
    }
}

impl Guard for GroupMemberGuard {
    fn name(&self) -> &'static str {
        "group_member"
    }

    fn check(&self, request: &RequestDescriptor, policy: &RoutePolicy) -> Result<(), GuardError> {
        check_group(request, policy, &self.param_names, GroupRight::Member)
    }
}

/// Caller must administer the group named by the route
#[derive(Debug, Clone)]
pub struct GroupAdminGuard {
    param_names: Vec<String>,
}

impl GroupAdminGuard {
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

impl Default for GroupAdminGuard {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_PARAMS.iter().copied())
    }
}

impl Guard for GroupAdminGuard {
    fn name(&self) -> &'static str {
        "group_admin"
    }

    fn check(&self, request: &RequestDescriptor, policy: &RoutePolicy) -> Result<(), GuardError> {
        check_group(request, policy, &self.param_names, GroupRight::Admin)
    }
}

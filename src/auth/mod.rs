use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Authenticated caller attached to the request by the upstream authentication stage.
///
/// Only `id` is mandatory; every other field defaults to empty so partially
/// populated identities behave as "holds nothing".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    pub id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub permissions: HashSet<String>,
    #[serde(default)]
    pub groups: HashSet<String>,
    #[serde(default)]
    pub admin_groups: HashSet<String>,
}

impl CallerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_admin_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_member_of(&self, group_id: &str) -> bool {
        self.groups.contains(group_id)
    }

    pub fn is_admin_of(&self, group_id: &str) -> bool {
        self.admin_groups.contains(group_id)
    }
}

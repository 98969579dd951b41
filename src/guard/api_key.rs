use std::collections::HashSet;

use crate::guard::error::GuardError;
use crate::guard::traits::Guard;
use crate::policy::RoutePolicy;
use crate::request::RequestDescriptor;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Validates a request header against a process-wide allow-list.
///
/// An empty allow-list accepts nothing.
#[derive(Debug, Clone)]
pub struct ApiKeyGuard {
    header: String,
    allowed: HashSet<String>,
}

impl ApiKeyGuard {
    pub fn new<I, S>(header: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: header.into().to_ascii_lowercase(),
            allowed: allowed
                .into_iter()
                .map(Into::into)
                .filter(|key: &String| !key.is_empty())
                .collect(),
        }
    }

    /// Build from a comma-separated list such as the `API_KEYS` variable
    pub fn from_list(header: impl Into<String>, list: &str) -> Self {
        Self::new(header, parse_key_list(list))
    }

    pub fn is_configured(&self) -> bool {
        !self.allowed.is_empty()
    }
}

pub fn parse_key_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

impl Guard for ApiKeyGuard {
    fn name(&self) -> &'static str {
        "api_key"
    }

    fn check(&self, request: &RequestDescriptor, _policy: &RoutePolicy) -> Result<(), GuardError> {
        let key = request
            .header(&self.header)
            .ok_or_else(|| GuardError::unauthenticated("API key is required"))?;

        if self.allowed.contains(key) {
            Ok(())
        } else {
            Err(GuardError::unauthenticated("Invalid API key"))
        }
    }
}

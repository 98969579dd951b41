// Per-route policies attached at route registration time
//
// Each route declares its own RoutePolicy when the router is built. The
// registry is the single place those declarations live, so the YAML override
// file and the router always agree on what a route requires.

pub mod error;
pub mod registry;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use error::PolicyError;
pub use registry::{PolicyRegistry, RouteSignature};

/// Access-control, rate-limit and cache configuration for a single route
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutePolicy {
    /// Public routes skip every identity-dependent guard
    pub public: bool,
    /// Caller role must match any of these
    pub roles: BTreeSet<String>,
    /// Caller must hold at least one of these
    pub permissions: BTreeSet<String>,
    pub rate_limit: Option<RateLimitPolicy>,
    pub cache: Option<CachePolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachePolicy {
    /// `None` caches with the configured default TTL, `Some(0)` disables caching
    pub ttl_seconds: Option<u64>,
    pub key: Option<String>,
}

impl RoutePolicy {
    pub fn public() -> Self {
        Self {
            public: true,
            ..Default::default()
        }
    }

    pub fn protected() -> Self {
        Self::default()
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
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

    pub fn with_rate_limit(mut self, limit: u32, window_ms: u64) -> Self {
        self.rate_limit = Some(RateLimitPolicy { limit, window_ms });
        self
    }

    pub fn with_cache(mut self, ttl_seconds: u64) -> Self {
        self.cache = Some(CachePolicy {
            ttl_seconds: Some(ttl_seconds),
            key: None,
        });
        self
    }

    pub fn with_cache_policy(mut self, cache: CachePolicy) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl CachePolicy {
    /// A zero TTL means "not configured", not "expire immediately"
    pub fn is_enabled(&self) -> bool {
        self.ttl_seconds != Some(0)
    }

    /// Custom base key; an empty string counts as no key
    pub fn custom_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|key| !key.is_empty())
    }

    pub fn ttl_ms(&self, default_ttl_secs: u64) -> u64 {
        self.ttl_seconds.unwrap_or(default_ttl_secs).saturating_mul(1000)
    }
}

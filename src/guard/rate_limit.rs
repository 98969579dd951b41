//! Per-client fixed-window rate limiting.
//!
//! Counters live in a [`RateLimitStore`] owned by the guard and shared
//! across requests. Each key is updated under its own `DashMap` shard lock,
//! so concurrent requests from one client never lose increments.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::clock::Clock;
use crate::guard::error::GuardError;
use crate::guard::traits::Guard;
use crate::policy::{RateLimitPolicy, RoutePolicy};
use crate::request::RequestDescriptor;

/// Bucket shared by every client whose address cannot be resolved
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitCounter {
    pub count: u32,
    pub reset_at_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Exceeded { retry_after_ms: i64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

#[derive(Debug, Default)]
pub struct RateLimitStore {
    counters: DashMap<String, RateLimitCounter>,
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request from `key` against `policy` at `now_ms`
    pub fn hit(&self, key: &str, policy: RateLimitPolicy, now_ms: i64) -> RateDecision {
        // A zero window would put reset_at at `now`, never strictly after it
        let window_ms = i64::try_from(policy.window_ms.max(1)).unwrap_or(i64::MAX);
        let fresh = RateLimitCounter {
            count: 1,
            reset_at_ms: now_ms.saturating_add(window_ms),
        };

        match self.counters.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                RateDecision::Allowed {
                    remaining: policy.limit.saturating_sub(1),
                }
            }
            Entry::Occupied(mut occupied) => {
                let counter = occupied.get_mut();
                if now_ms > counter.reset_at_ms {
                    *counter = fresh;
                    RateDecision::Allowed {
                        remaining: policy.limit.saturating_sub(1),
                    }
                } else if counter.count >= policy.limit {
                    RateDecision::Exceeded {
                        retry_after_ms: counter.reset_at_ms - now_ms,
                    }
                } else {
                    counter.count += 1;
                    RateDecision::Allowed {
                        remaining: policy.limit.saturating_sub(counter.count),
                    }
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<RateLimitCounter> {
        self.counters.get(key).map(|counter| *counter)
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drop counters whose window has passed; returns how many were removed
    pub fn evict_expired(&self, now_ms: i64) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, counter| now_ms <= counter.reset_at_ms);
        before.saturating_sub(self.counters.len())
    }
}

pub struct RateLimitGuard {
    store: Arc<RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimitGuard {
    pub fn new(store: Arc<RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<RateLimitStore> {
        &self.store
    }
}

impl Guard for RateLimitGuard {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn check(&self, request: &RequestDescriptor, policy: &RoutePolicy) -> Result<(), GuardError> {
        let Some(limit) = policy.rate_limit else {
            return Ok(());
        };

        let client = request.client_addr.as_deref().unwrap_or(UNKNOWN_CLIENT);
        match self.store.hit(client, limit, self.clock.now_ms()) {
            RateDecision::Allowed { remaining } => {
                tracing::trace!("Rate limit for {}: {} remaining", client, remaining);
                Ok(())
            }
            RateDecision::Exceeded { retry_after_ms } => {
                tracing::debug!("Rate limit exceeded for {}, resets in {}ms", client, retry_after_ms);
                Err(GuardError::rate_limited("Too many requests, please try again later"))
            }
        }
    }
}

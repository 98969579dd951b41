//! Global per-endpoint throttling.
//!
//! A [`ThrottleStore`] remembers when each `METHOD:route` signature last
//! accepted a request. Updates go through the `DashMap` entry API, so two
//! concurrent requests to one signature cannot both be accepted.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::clock::Clock;
use crate::guard::error::GuardError;
use crate::guard::traits::Guard;
use crate::policy::RoutePolicy;
use crate::request::RequestDescriptor;

/// Minimum spacing between accepted requests to one route signature
pub const DEFAULT_THROTTLE_INTERVAL_MS: i64 = 1000;

/// Last accepted timestamp per `METHOD:route` signature
#[derive(Debug, Default)]
pub struct ThrottleStore {
    last_accepted: DashMap<String, i64>,
}

impl ThrottleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept and record `now_ms` unless the previous acceptance is too recent
    pub fn try_accept(&self, key: &str, now_ms: i64, min_interval_ms: i64) -> bool {
        match self.last_accepted.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(now_ms);
                true
            }
            Entry::Occupied(mut occupied) => {
                let last = *occupied.get();
                // A clock stepping backwards lands here too, keeping timestamps non-decreasing
                if now_ms - last < min_interval_ms {
                    false
                } else {
                    occupied.insert(now_ms);
                    true
                }
            }
        }
    }

    pub fn last_accepted(&self, key: &str) -> Option<i64> {
        self.last_accepted.get(key).map(|ts| *ts)
    }

    pub fn len(&self) -> usize {
        self.last_accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_accepted.is_empty()
    }

    /// Drop signatures whose last acceptance is at least `min_interval_ms` old.
    ///
    /// Such entries would accept the next request anyway.
    pub fn evict_idle(&self, now_ms: i64, min_interval_ms: i64) -> usize {
        let before = self.last_accepted.len();
        self.last_accepted
            .retain(|_, last| now_ms - *last < min_interval_ms);
        before.saturating_sub(self.last_accepted.len())
    }
}

/// Global per-endpoint throttle.
///
/// The key ignores caller identity: two callers hitting the same endpoint
/// inside the interval compete for the same slot.
pub struct ThrottleGuard {
    store: Arc<ThrottleStore>,
    clock: Arc<dyn Clock>,
    min_interval_ms: i64,
}

impl ThrottleGuard {
    pub fn new(store: Arc<ThrottleStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            min_interval_ms: DEFAULT_THROTTLE_INTERVAL_MS,
        }
    }

    /// Minimum spacing between accepted requests; `0` disables throttling
    pub fn with_interval_ms(mut self, min_interval_ms: i64) -> Self {
        self.min_interval_ms = min_interval_ms;
        self
    }

    /// Throttle key: method plus the matched route template, never the concrete path
    pub fn signature(request: &RequestDescriptor) -> String {
        format!("{}:{}", request.method, request.route_path)
    }
}

impl Guard for ThrottleGuard {
    fn name(&self) -> &'static str {
        "throttle"
    }

    fn check(&self, request: &RequestDescriptor, _policy: &RoutePolicy) -> Result<(), GuardError> {
        let signature = Self::signature(request);
        if self
            .store
            .try_accept(&signature, self.clock.now_ms(), self.min_interval_ms)
        {
            Ok(())
        } else {
            Err(GuardError::rate_limited("Request throttled, please slow down"))
        }
    }
}

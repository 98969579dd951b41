//! Background sweepers for the in-memory stores.
//!
//! Expired rate-limit counters, idle throttle signatures, and expired cache
//! entries are otherwise only replaced on the next hit for the same key.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::cache::MemoryCacheStore;
use crate::clock::Clock;
use crate::guard::{RateLimitStore, ThrottleStore};

/// Run `sweep` every `period` until the returned task is aborted
pub fn spawn_periodic<F>(name: &'static str, period: Duration, sweep: F) -> JoinHandle<()>
where
    F: Fn() -> usize + Send + 'static,
{
    let period = period.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = sweep();
            if removed > 0 {
                tracing::debug!("{} sweep removed {} entries", name, removed);
            }
        }
    })
}

pub struct Sweepers {
    handles: Vec<JoinHandle<()>>,
}

impl Sweepers {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl Drop for Sweepers {
    fn drop(&mut self) {
        self.abort();
    }
}

pub struct SweepSchedule {
    pub rate_limit_period: Duration,
    pub throttle_interval_ms: i64,
    pub cache_period: Duration,
}

/// Start sweepers for the rate-limit, throttle and cache stores
pub fn spawn_sweepers(
    schedule: SweepSchedule,
    clock: Arc<dyn Clock>,
    rate_limits: Arc<RateLimitStore>,
    throttles: Arc<ThrottleStore>,
    cache: Arc<MemoryCacheStore>,
) -> Sweepers {
    let counters_clock = clock.clone();
    let counters = spawn_periodic("rate_limit", schedule.rate_limit_period, move || {
        rate_limits.evict_expired(counters_clock.now_ms())
    });

    let throttle_interval_ms = schedule.throttle_interval_ms;
    let signatures = spawn_periodic("throttle", schedule.rate_limit_period, move || {
        throttles.evict_idle(clock.now_ms(), throttle_interval_ms)
    });

    let cached = spawn_periodic("cache", schedule.cache_period, move || cache.purge_expired());

    Sweepers {
        handles: vec![counters, signatures, cached],
    }
}

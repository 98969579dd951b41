// Response cache wrapped around handler invocation
//
// START -> BYPASS (no key)
//       -> LOOKUP -> RETURN_CACHED (hit)
//                 -> INVOKE_HANDLER -> STORE_ASYNC (best effort) -> RETURN_FRESH
//
// Every terminal path hands the caller the same value; they differ only in
// latency and logging. Store failures never reach the caller.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::key::track_by;
use crate::cache::store::CacheStore;
use crate::policy::CachePolicy;
use crate::request::RequestDescriptor;

pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Which handler results are stored, and which stored values count as hits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheAdmission {
    /// Only truthy values: `null`, `false`, `0` and `""` are never cached
    /// and read back as misses. Existing clients depend on this.
    #[default]
    Truthy,
    /// Every successful result
    Always,
}

impl CacheAdmission {
    pub fn admits(&self, value: &Value) -> bool {
        match self {
            CacheAdmission::Truthy => is_truthy(value),
            CacheAdmission::Always => true,
        }
    }
}

impl std::str::FromStr for CacheAdmission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "truthy" => Ok(CacheAdmission::Truthy),
            "always" => Ok(CacheAdmission::Always),
            other => Err(format!("unknown cache admission rule: {other}")),
        }
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// How an invocation was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Bypass,
    Hit,
    Miss,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Bypass => "BYPASS",
            CacheOutcome::Hit => "HIT",
            CacheOutcome::Miss => "MISS",
        }
    }
}

#[derive(Clone)]
pub struct ResponseCacheInterceptor {
    store: Arc<dyn CacheStore>,
    admission: CacheAdmission,
    default_ttl_secs: u64,
}

impl ResponseCacheInterceptor {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            admission: CacheAdmission::default(),
            default_ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    pub fn with_admission(mut self, admission: CacheAdmission) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_default_ttl_secs(mut self, default_ttl_secs: u64) -> Self {
        self.default_ttl_secs = default_ttl_secs;
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Return a cached value for the request or run `handler` and cache its result.
    ///
    /// Handler errors pass through unmodified and are never cached.
    pub async fn intercept<F, Fut, E>(
        &self,
        request: &RequestDescriptor,
        policy: Option<&CachePolicy>,
        handler: F,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        self.intercept_with_outcome(request, policy, handler)
            .await
            .map(|(value, _)| value)
    }

    pub async fn intercept_with_outcome<F, Fut, E>(
        &self,
        request: &RequestDescriptor,
        policy: Option<&CachePolicy>,
        handler: F,
    ) -> Result<(Value, CacheOutcome), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        let Some(key) = track_by(request, policy) else {
            return handler().await.map(|value| (value, CacheOutcome::Bypass));
        };

        if let Some(cached) = self.lookup(&key).await {
            tracing::debug!("Cache HIT: {}", key);
            return Ok((cached, CacheOutcome::Hit));
        }
        tracing::debug!("Cache MISS: {}", key);

        let value = handler().await?;

        if self.admission.admits(&value) {
            let ttl_ms = policy
                .map(|policy| policy.ttl_ms(self.default_ttl_secs))
                .unwrap_or(self.default_ttl_secs.saturating_mul(1000));
            self.store_in_background(key, value.clone(), ttl_ms);
        }

        Ok((value, CacheOutcome::Miss))
    }

    async fn lookup(&self, key: &str) -> Option<Value> {
        match self.store.get(key).await {
            Ok(Some(value)) if self.admission.admits(&value) => Some(value),
            Ok(_) => None,
            Err(error) => {
                tracing::error!(error = %error, "Cache lookup failed: {}", key);
                None
            }
        }
    }

    /// The response never waits on this write
    fn store_in_background(&self, key: String, value: Value, ttl_ms: u64) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(error) = store.set(&key, value, ttl_ms).await {
                tracing::error!(error = %error, "Failed to cache: {}", key);
            }
        });
    }
}

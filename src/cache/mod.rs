// Response caching: key derivation, store abstraction and the interceptor
// that decides whether a handler needs to run at all.

pub mod interceptor;
pub mod key;
pub mod store;

pub use interceptor::{CacheAdmission, CacheOutcome, ResponseCacheInterceptor, DEFAULT_TTL_SECS};
pub use key::track_by;
pub use store::{CacheError, CacheStore, MemoryCacheStore};

use crate::policy::CachePolicy;
use crate::request::RequestDescriptor;

pub const KEY_PREFIX: &str = "cache";

/// Derive the cache key for a request, or `None` when the route is not cached.
///
/// Automatic keys are `cache:<METHOD>:<path>[:<query json>]`; custom keys are
/// used verbatim. Either form gets `:user:<id>` for authenticated callers so
/// per-user responses never collide.
pub fn track_by(request: &RequestDescriptor, policy: Option<&CachePolicy>) -> Option<String> {
    let policy = policy.filter(|policy| policy.is_enabled())?;

    let mut key = match policy.custom_key() {
        Some(custom) => custom.to_string(),
        None => automatic_key(request),
    };

    if let Some(identity) = request.identity.as_ref().filter(|identity| !identity.id.is_empty()) {
        key.push_str(":user:");
        key.push_str(&identity.id);
    }

    Some(key)
}

fn automatic_key(request: &RequestDescriptor) -> String {
    let mut key = format!("{}:{}:{}", KEY_PREFIX, request.method, normalize_path(&request.path));

    if !request.query.is_empty() {
        // BTreeMap serializes with sorted keys
        if let Ok(query) = serde_json::to_string(&request.query) {
            key.push(':');
            key.push_str(&query);
        }
    }

    key
}

/// Strip the query string and any trailing slash, keeping `/` for the root
pub fn normalize_path(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

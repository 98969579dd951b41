// Normalized, read-only view of an inbound request
//
// Built once per request by the guard middleware and shared with the cache
// middleware through request extensions. Guards and key derivation only ever
// see this struct, never the raw axum request.

use std::collections::{BTreeMap, HashMap};

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;

use crate::auth::CallerIdentity;

/// Resource loaded by an earlier pipeline stage (e.g. the message loader)
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedResource {
    pub id: String,
    pub owner_id: Value,
}

impl LoadedResource {
    pub fn new(id: impl Into<String>, owner_id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
        }
    }

    /// Owner id coerced to the string form caller ids use
    pub fn owner_key(&self) -> Option<String> {
        match &self.owner_id {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Concrete request path without the query string
    pub path: String,
    /// Declared route template, e.g. `/api/groups/:groupId/messages`
    pub route_path: String,
    /// Sorted so serialized forms are deterministic
    pub query: BTreeMap<String, String>,
    pub params: HashMap<String, String>,
    pub headers: HeaderMap,
    pub client_addr: Option<String>,
    pub identity: Option<CallerIdentity>,
    pub resource: Option<LoadedResource>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            method,
            route_path: path.clone(),
            path,
            query: BTreeMap::new(),
            params: HashMap::new(),
            headers: HeaderMap::new(),
            client_addr: None,
            identity: None,
            resource: None,
        }
    }

    pub fn with_route_path(mut self, route_path: impl Into<String>) -> Self {
        self.route_path = route_path.into();
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Panics on an invalid header name or value; intended for building fixtures
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers
            .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        self
    }

    pub fn with_client_addr(mut self, addr: impl Into<String>) -> Self {
        self.client_addr = Some(addr.into());
        self
    }

    pub fn with_identity(mut self, identity: CallerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_resource(mut self, resource: LoadedResource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// First non-empty route parameter among `names`, in order
    pub fn param_any<S: AsRef<str>>(&self, names: &[S]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.params.get(name.as_ref()))
            .map(String::as_str)
            .find(|value| !value.is_empty())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Parse a raw query string; repeated keys keep the last value
pub fn parse_query(raw: Option<&str>) -> BTreeMap<String, String> {
    raw.map(|raw| {
        url::form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect()
    })
    .unwrap_or_default()
}

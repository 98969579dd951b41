use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::{PolicyError, RoutePolicy};

/// `METHOD /route/template` pair identifying a single handler
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteSignature {
    pub method: String,
    pub path: String,
}

impl RouteSignature {
    pub fn new(method: impl AsRef<str>, path: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            path: path.into(),
        }
    }
}

impl fmt::Display for RouteSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

impl FromStr for RouteSignature {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(path), None) if path.starts_with('/') => Ok(Self::new(method, path)),
            _ => Err(PolicyError::InvalidSignature(s.to_string())),
        }
    }
}

/// Route policies keyed by route signature.
///
/// Routes that were never registered resolve to the default (protected,
/// unrestricted) policy.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    routes: HashMap<RouteSignature, Arc<RoutePolicy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy, keeping any override already loaded for the same route
    pub fn register(&mut self, method: &str, path: &str, policy: RoutePolicy) -> Arc<RoutePolicy> {
        let signature = RouteSignature::new(method, path);
        self.routes
            .entry(signature)
            .or_insert_with(|| Arc::new(policy))
            .clone()
    }

    /// Insert or replace a policy
    pub fn set(&mut self, method: &str, path: &str, policy: RoutePolicy) {
        self.routes.insert(RouteSignature::new(method, path), Arc::new(policy));
    }

    pub fn resolve(&self, method: &str, path: &str) -> Arc<RoutePolicy> {
        self.routes
            .get(&RouteSignature::new(method, path))
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Apply overrides from YAML of the form `"GET /path": { ...policy... }`
    pub fn apply_yaml(&mut self, yaml: &str) -> Result<usize, PolicyError> {
        let overrides: BTreeMap<String, RoutePolicy> = serde_yaml::from_str(yaml)?;
        let count = overrides.len();

        for (signature, policy) in overrides {
            let signature: RouteSignature = signature.parse()?;
            tracing::debug!("Policy override loaded for {}", signature);
            self.routes.insert(signature, Arc::new(policy));
        }

        Ok(count)
    }

    pub fn apply_yaml_file(&mut self, path: impl AsRef<Path>) -> Result<usize, PolicyError> {
        let contents = std::fs::read_to_string(path)?;
        self.apply_yaml(&contents)
    }
}

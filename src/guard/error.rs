use thiserror::Error;

/// Denial raised by a guard; the first one stops the chain
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// No or invalid caller identity, missing or unknown API key
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Identity present but lacking the role, permission, membership or ownership required
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Per-client rate limit exceeded or endpoint throttle window violated
    #[error("Rate limited: {0}")]
    RateLimited(String),
}

impl GuardError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        GuardError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        GuardError::Forbidden(message.into())
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        GuardError::RateLimited(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            GuardError::Unauthenticated(msg) => msg,
            GuardError::Forbidden(msg) => msg,
            GuardError::RateLimited(msg) => msg,
        }
    }
}

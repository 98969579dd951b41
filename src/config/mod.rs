use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

use crate::cache::CacheAdmission;
use crate::guard::api_key::{parse_key_list, API_KEY_HEADER};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    /// Largest handler response buffered for caching
    pub max_cached_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    /// API key allow-list; empty rejects every key
    pub api_keys: Vec<String>,
    pub api_key_header: String,
    /// Accept the `x-caller` identity header in place of an upstream auth stage
    pub trust_identity_header: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub throttle_interval_ms: i64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub default_ttl_secs: u64,
    pub admission: CacheAdmission,
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Some(port) = env::var("CHAT_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_CACHED_BODY_BYTES") {
            self.api.max_cached_body_bytes = v.parse().unwrap_or(self.api.max_cached_body_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("API_KEYS") {
            self.security.api_keys = parse_key_list(&v);
        }
        if let Ok(v) = env::var("SECURITY_API_KEY_HEADER") {
            self.security.api_key_header = v;
        }
        if let Ok(v) = env::var("SECURITY_TRUST_IDENTITY_HEADER") {
            self.security.trust_identity_header = v.parse().unwrap_or(self.security.trust_identity_header);
        }

        // Rate limit overrides
        if let Ok(v) = env::var("RATE_LIMIT_THROTTLE_INTERVAL_MS") {
            self.rate_limit.throttle_interval_ms = v.parse().unwrap_or(self.rate_limit.throttle_interval_ms);
        }
        if let Ok(v) = env::var("RATE_LIMIT_SWEEP_INTERVAL_SECS") {
            self.rate_limit.sweep_interval_secs = v.parse().unwrap_or(self.rate_limit.sweep_interval_secs);
        }

        // Cache overrides
        if let Ok(v) = env::var("CACHE_DEFAULT_TTL_SECS") {
            self.cache.default_ttl_secs = v.parse().unwrap_or(self.cache.default_ttl_secs);
        }
        if let Ok(v) = env::var("CACHE_ADMISSION") {
            self.cache.admission = v.parse().unwrap_or(self.cache.admission);
        }
        if let Ok(v) = env::var("CACHE_SWEEP_INTERVAL_SECS") {
            self.cache.sweep_interval_secs = v.parse().unwrap_or(self.cache.sweep_interval_secs);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_cached_body_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                api_keys: Vec::new(),
                api_key_header: API_KEY_HEADER.to_string(),
                trust_identity_header: true,
            },
            rate_limit: RateLimitConfig {
                throttle_interval_ms: 1000,
                sweep_interval_secs: 300,
            },
            cache: CacheConfig {
                default_ttl_secs: 3600,
                admission: CacheAdmission::Truthy,
                sweep_interval_secs: 3600,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_cached_body_bytes: 512 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                api_keys: Vec::new(),
                api_key_header: API_KEY_HEADER.to_string(),
                trust_identity_header: false,
            },
            rate_limit: RateLimitConfig {
                throttle_interval_ms: 1000,
                sweep_interval_secs: 300,
            },
            cache: CacheConfig {
                default_ttl_secs: 3600,
                admission: CacheAdmission::Truthy,
                sweep_interval_secs: 3600,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
                max_cached_body_bytes: 512 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                api_keys: Vec::new(),
                api_key_header: API_KEY_HEADER.to_string(),
                trust_identity_header: false,
            },
            rate_limit: RateLimitConfig {
                throttle_interval_ms: 1000,
                sweep_interval_secs: 60,
            },
            cache: CacheConfig {
                default_ttl_secs: 3600,
                admission: CacheAdmission::Truthy,
                sweep_interval_secs: 3600,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

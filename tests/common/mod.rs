#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use chat_api_rust::app::{app, Services};
use chat_api_rust::clock::SystemClock;
use chat_api_rust::config::AppConfig;
use chat_api_rust::middleware::CALLER_HEADER;
use chat_api_rust::policy::PolicyRegistry;

pub const API_KEY: &str = "test-key";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub client: reqwest::Client,
    pub services: Services,
}

/// Development config with request logging off and a known API key
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.api.enable_request_logging = false;
    config.security.api_keys = vec![API_KEY.to_string()];
    config
}

impl TestServer {
    /// Serve the app in-process on an unused port; it stops with the test runtime
    pub async fn start(config: AppConfig) -> Result<Self> {
        Self::start_with_policies(config, PolicyRegistry::new()).await
    }

    pub async fn start_with_policies(config: AppConfig, policies: PolicyRegistry) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let services = Services::new(config, SystemClock::shared()).with_policies(policies);
        let router = app(services.clone());

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind port {}", port))?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await;
        });

        let server = Self {
            port,
            base_url,
            client: reqwest::Client::new(),
            services,
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = self.client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path))
    }
}

/// Identity header value for a caller
pub fn caller(id: &str, groups: &[&str]) -> String {
    json!({ "id": id, "groups": groups }).to_string()
}

pub fn admin(id: &str, permissions: &[&str]) -> String {
    json!({ "id": id, "role": "admin", "permissions": permissions }).to_string()
}

pub trait AsCaller {
    fn as_caller(self, identity: String) -> Self;
}

impl AsCaller for reqwest::RequestBuilder {
    fn as_caller(self, identity: String) -> Self {
        self.header(CALLER_HEADER, identity)
    }
}

pub async fn json_body(res: reqwest::Response) -> Result<(StatusCode, Value)> {
    let status = res.status();
    let body = res.json::<Value>().await?;
    Ok((status, body))
}

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chat_api_rust::app::{app, Services};
use chat_api_rust::clock::SystemClock;
use chat_api_rust::policy::PolicyRegistry;

#[derive(Parser)]
#[command(name = "chat-api")]
#[command(about = "Chat API server with declarative route guards and response caching")]
#[command(version)]
struct Args {
    #[arg(long, help = "Port to listen on (overrides CHAT_API_PORT)")]
    port: Option<u16>,

    #[arg(long, env = "CHAT_API_POLICIES", help = "YAML file of route policy overrides")]
    policies: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up APP_ENV, API_KEYS, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // Initialize configuration (this loads the config singleton)
    let config = chat_api_rust::config::config();
    tracing::info!("Starting Chat API in {:?} mode", config.environment);

    let mut policies = PolicyRegistry::new();
    if let Some(path) = &args.policies {
        let applied = policies
            .apply_yaml_file(path)
            .with_context(|| format!("failed to load route policies from {}", path.display()))?;
        tracing::info!("Loaded {} route policy overrides from {}", applied, path.display());
    }

    let services = Services::new(config.clone(), SystemClock::shared()).with_policies(policies);
    let _sweepers = services.spawn_sweepers();
    let app = app(services);

    let port = args.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Chat API listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;

    Ok(())
}

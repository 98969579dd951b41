mod common;

use anyhow::Result;
use reqwest::StatusCode;

use common::{json_body, test_config, TestServer};

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = TestServer::start(test_config()).await?;

    let (status, body) = json_body(server.get("/health").send().await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn root_describes_endpoints() -> Result<()> {
    let server = TestServer::start(test_config()).await?;

    let (status, body) = json_body(server.get("/").send().await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["data"]["endpoints"]["messages"].is_string());
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_not_found() -> Result<()> {
    let server = TestServer::start(test_config()).await?;

    let res = server.get("/api/nowhere").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

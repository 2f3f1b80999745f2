//! Per-identity and per-address admission control.

use crate::common::app::SeedToken;
use crate::common::{TestApp, World};
use http::StatusCode;

mod common;

#[tokio::test]
async fn test_token_ceiling_enforced() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let world = World::seed(&app).await?;
    let token = app
        .seed_token(SeedToken::agent(world.alice).rate_limit(3))
        .await?;

    for expected_remaining in ["2", "1", "0"] {
        let resp = app.get("/api/v1/whoami", Some(&token)).await?;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.header("x-ratelimit-limit"), Some("3"));
        assert_eq!(resp.header("x-ratelimit-remaining"), Some(expected_remaining));
    }

    let resp = app.get("/api/v1/whoami", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.error_code(), Some("core:rate_limited"));
    assert_eq!(resp.header("retry-after"), Some("60"));
    assert_eq!(resp.header("x-ratelimit-limit"), Some("3"));
    assert_eq!(resp.header("x-ratelimit-remaining"), Some("0"));
    Ok(())
}

#[tokio::test]
async fn test_denied_requests_still_consume() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let world = World::seed(&app).await?;
    let token = app
        .seed_token(SeedToken::agent(world.carol).rate_limit(2))
        .await?;
    let uri = format!("/api/v1/tickets/{}", world.first_ticket);

    // Admission happens before the permission check.
    assert_eq!(app.get(&uri, Some(&token)).await?.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&uri, Some(&token)).await?.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.get(&uri, Some(&token)).await?.status,
        StatusCode::TOO_MANY_REQUESTS
    );
    Ok(())
}

#[tokio::test]
async fn test_tokens_have_independent_buckets() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let world = World::seed(&app).await?;
    let first = app
        .seed_token(SeedToken::agent(world.alice).rate_limit(1))
        .await?;
    let second = app
        .seed_token(SeedToken::agent(world.alice).rate_limit(1))
        .await?;

    assert_eq!(app.get("/api/v1/whoami", Some(&first)).await?.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/v1/whoami", Some(&first)).await?.status,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(app.get("/api/v1/whoami", Some(&second)).await?.status, StatusCode::OK);
    assert_eq!(app.limiter.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_zero_ceiling_falls_back_to_default() -> anyhow::Result<()> {
    let app = TestApp::with_config(|c| c.rate_limit.default_limit = 5).await?;
    let world = World::seed(&app).await?;
    let token = app
        .seed_token(SeedToken::agent(world.alice).rate_limit(0))
        .await?;

    let resp = app.get("/api/v1/whoami", Some(&token)).await?;
    assert_eq!(resp.header("x-ratelimit-limit"), Some("5"));
    Ok(())
}

#[tokio::test]
async fn test_health_limited_by_address() -> anyhow::Result<()> {
    let app = TestApp::with_config(|c| c.rate_limit.default_limit = 2).await?;

    for _ in 0..2 {
        let resp = app.get("/health", None).await?;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body["status"], "ok");
    }
    let resp = app.get("/health", None).await?;
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}

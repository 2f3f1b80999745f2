//! End-to-end authorization scenarios: identity, scope, and group checks.

use crate::common::app::SeedToken;
use crate::common::{TestApp, World};
use chrono::{Duration, Utc};
use deskgate::auth::{JwtKeys, SessionClaims};
use deskgate::permissions::PermissionKind;
use http::StatusCode;
use serde_json::json;

mod common;

const JWT_SECRET: &str = "0123456789abcdef0123456789abcdef";

async fn setup() -> anyhow::Result<(TestApp, World)> {
    let app = TestApp::new().await?;
    let world = World::seed(&app).await?;
    Ok((app, world))
}

#[tokio::test]
async fn test_full_scope_agent_reads_ticket_in_granted_queue() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::agent(world.alice)).await?;

    let resp = app
        .get(&format!("/api/v1/tickets/{}", world.first_ticket), Some(&token))
        .await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["title"], "Printer on fire");
    assert_eq!(resp.header("x-ratelimit-limit"), Some("1000"));
    assert_eq!(resp.header("x-ratelimit-remaining"), Some("999"));
    Ok(())
}

#[tokio::test]
async fn test_read_only_scope_cannot_write() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app
        .seed_token(SeedToken::agent(world.alice).scopes(&["tickets:read"]))
        .await?;
    let uri = format!("/api/v1/tickets/{}", world.first_ticket);

    let resp = app.get(&uri, Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.patch(&uri, Some(&token), json!({ "title": "x" })).await?;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_code(), Some("core:forbidden"));
    assert_eq!(
        resp.body["error"]["message"],
        "Token missing required scope: tickets:write"
    );

    let resp = app.delete(&uri, Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let ticket = app.db.tickets().get(world.first_ticket).await?;
    assert_eq!(ticket.title, "Printer on fire");
    Ok(())
}

#[tokio::test]
async fn test_ro_agent_is_refused_writes() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::agent(world.bob)).await?;
    let uri = format!("/api/v1/tickets/{}", world.first_ticket);

    let resp = app.get(&uri, Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);

    // Readable, so the update is an honest 403.
    let resp = app.patch(&uri, Some(&token), json!({ "title": "x" })).await?;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    // Deletes never confirm existence.
    let resp = app.delete(&uri, Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_code(), Some("core:not_found"));

    assert!(app.db.tickets().find(world.first_ticket).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_agent_without_grant_sees_not_found() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::agent(world.carol)).await?;
    let uri = format!("/api/v1/tickets/{}", world.first_ticket);

    let resp = app.get(&uri, Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app.patch(&uri, Some(&token), json!({ "title": "x" })).await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app.delete(&uri, Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_denial_matches_missing_ticket() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::agent(world.carol)).await?;

    let hidden = app
        .get(&format!("/api/v1/tickets/{}", world.first_ticket), Some(&token))
        .await?;
    let missing = app.get("/api/v1/tickets/9999", Some(&token)).await?;
    assert_eq!(hidden.status, missing.status);
    assert_eq!(hidden.body, missing.body);
    Ok(())
}

#[tokio::test]
async fn test_rw_agent_updates_and_deletes() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::agent(world.alice)).await?;
    let uri = format!("/api/v1/tickets/{}", world.first_ticket);

    let resp = app
        .patch(&uri, Some(&token), json!({ "title": "Printer extinguished" }))
        .await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["title"], "Printer extinguished");

    let resp = app
        .patch(&format!("{uri}/priority"), Some(&token), json!({ "priority": 5 }))
        .await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["priority"], 5);

    let resp = app
        .post(
            &format!("{uri}/articles"),
            Some(&token),
            json!({ "body": "Called the fire department", "internal": true }),
        )
        .await?;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app.delete(&uri, Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get(&uri, Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_note_grant_allows_articles_only() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    app.db
        .grants()
        .grant_agent(world.carol, world.support, PermissionKind::Note)
        .await?;
    let token = app.seed_token(SeedToken::agent(world.carol)).await?;
    let uri = format!("/api/v1/tickets/{}", world.first_ticket);

    let resp = app
        .post(&format!("{uri}/articles"), Some(&token), json!({ "body": "noted" }))
        .await?;
    assert_eq!(resp.status, StatusCode::CREATED);

    // note carries no read access, so other denials stay hidden.
    let resp = app
        .patch(&format!("{uri}/priority"), Some(&token), json!({ "priority": 1 }))
        .await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app.get(&uri, Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_customer_owned_ticket_without_grants() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::customer(world.xena)).await?;

    let resp = app
        .get(&format!("/api/v1/tickets/{}", world.acme_ticket), Some(&token))
        .await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["customer_id"], "acme");

    let resp = app
        .get(&format!("/api/v1/tickets/{}", world.globex_ticket), Some(&token))
        .await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_customer_reaches_foreign_ticket_through_grant() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::customer(world.xena)).await?;
    let uri = format!("/api/v1/tickets/{}", world.globex_ticket);

    assert_eq!(app.get(&uri, Some(&token)).await?.status, StatusCode::NOT_FOUND);

    app.db
        .grants()
        .grant_company("acme", world.billing, PermissionKind::Ro)
        .await?;
    assert_eq!(app.get(&uri, Some(&token)).await?.status, StatusCode::OK);

    // An individual grant works the same way for a different customer.
    let yuri = app.seed_token(SeedToken::customer(world.yuri)).await?;
    let acme_uri = format!("/api/v1/tickets/{}", world.acme_ticket);
    assert_eq!(app.get(&acme_uri, Some(&yuri)).await?.status, StatusCode::NOT_FOUND);
    app.db
        .grants()
        .grant_customer("yuri", world.billing, PermissionKind::Rw)
        .await?;
    assert_eq!(app.get(&acme_uri, Some(&yuri)).await?.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_customer_restrictions() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::customer(world.xena)).await?;
    let uri = format!("/api/v1/tickets/{}", world.acme_ticket);

    // Priority is agent-only; the ticket is readable so the refusal is 403.
    let resp = app
        .patch(&format!("{uri}/priority"), Some(&token), json!({ "priority": 1 }))
        .await?;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    // tickets:delete and queues:read are agent-only scopes.
    let resp = app.delete(&uri, Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(
        resp.body["error"]["message"],
        "This endpoint is not available to customers"
    );
    let resp = app
        .get(&format!("/api/v1/queues/{}", world.invoices), Some(&token))
        .await?;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    // Articles from customers are accepted on their own tickets.
    let resp = app
        .post(
            &format!("{uri}/articles"),
            Some(&token),
            json!({ "body": "Any news?", "internal": true }),
        )
        .await?;
    assert_eq!(resp.status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn test_customer_files_ticket_in_granted_queue() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::customer(world.xena)).await?;
    let uri = format!("/api/v1/queues/{}/tickets", world.invoices);
    let body = json!({ "title": "Need a copy of 1042", "customer_id": "globex" });

    let resp = app.post(&uri, Some(&token), body.clone()).await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    app.db
        .grants()
        .grant_company("acme", world.billing, PermissionKind::Rw)
        .await?;
    let resp = app.post(&uri, Some(&token), body).await?;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["customer_id"], "acme");
    Ok(())
}

#[tokio::test]
async fn test_queue_view_lists_effective_grants() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::agent(world.alice)).await?;

    let resp = app
        .get(&format!("/api/v1/queues/{}", world.first_line), Some(&token))
        .await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["name"], "first-line");
    assert_eq!(resp.body["permissions"], serde_json::json!(["rw"]));

    let resp = app
        .get(&format!("/api/v1/queues/{}", world.invoices), Some(&token))
        .await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_admin_scope_requires_admin_role() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let root = app.seed_token(SeedToken::agent(world.root)).await?;
    let alice = app.seed_token(SeedToken::agent(world.alice)).await?;

    let resp = app.get("/api/v1/admin/scopes", Some(&root)).await?;
    assert_eq!(resp.status, StatusCode::OK);
    let scopes = resp.body["scopes"].as_array().cloned().unwrap_or_default();
    assert!(scopes.iter().any(|s| s["scope"] == "admin:*"));

    let resp = app.get("/api/v1/admin/scopes", Some(&alice)).await?;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.body["error"]["message"], "Insufficient role for scope: admin:*");

    // Admin role does not bypass group permissions.
    let resp = app
        .get(&format!("/api/v1/tickets/{}", world.first_ticket), Some(&root))
        .await?;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_whoami_reports_identity() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::customer(world.xena)).await?;

    let resp = app.get("/api/v1/whoami", Some(&token)).await?;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["kind"], "customer");
    assert_eq!(resp.body["principal_id"], world.xena);
    assert_eq!(resp.body["customer"]["login"], "xena");
    assert_eq!(resp.body["customer"]["company_id"], "acme");

    let resp = app.get("/api/v1/scopes", Some(&token)).await?;
    let scopes: Vec<String> = resp.body["scopes"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter_map(|s| s["scope"].as_str().map(str::to_owned))
        .collect();
    assert!(scopes.contains(&"tickets:read".to_string()));
    assert!(!scopes.contains(&"tickets:delete".to_string()));
    assert!(!scopes.contains(&"admin:*".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_credential_failures_are_unauthorized() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let uri = format!("/api/v1/tickets/{}", world.first_ticket);

    let resp = app.get(&uri, None).await?;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_code(), Some("core:unauthorized"));
    assert_eq!(resp.body["error"]["message"], "Authentication required");
    assert!(resp.header("x-ratelimit-limit").is_none());

    let expired = app
        .seed_token(SeedToken::agent(world.alice).expires_at(Utc::now() - Duration::days(1)))
        .await?;
    let resp = app.get(&uri, Some(&expired)).await?;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_code(), Some("core:token_expired"));

    let revoked = app.seed_revoked_token(SeedToken::agent(world.alice)).await?;
    let resp = app.get(&uri, Some(&revoked)).await?;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_code(), Some("core:token_revoked"));

    let resp = app.get(&uri, Some("gf_deadbeef_00112233")).await?;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_code(), Some("core:invalid_token"));

    let resp = app.get(&uri, Some("gf_dead")).await?;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_code(), Some("core:invalid_token"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_ticket_id() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let token = app.seed_token(SeedToken::agent(world.alice)).await?;

    for id in ["abc", "0", "-3"] {
        let resp = app.get(&format!("/api/v1/tickets/{id}"), Some(&token)).await?;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "id {id}");
        assert_eq!(resp.error_code(), Some("core:invalid_id"));
    }
    Ok(())
}

#[tokio::test]
async fn test_session_jwt_without_secret_is_unavailable() -> anyhow::Result<()> {
    let (app, world) = setup().await?;
    let resp = app
        .get(
            &format!("/api/v1/tickets/{}", world.first_ticket),
            Some("eyJhbGciOiJIUzI1NiJ9.e30.sig"),
        )
        .await?;
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.error_code(), Some("core:service_unavailable"));
    Ok(())
}

#[tokio::test]
async fn test_session_jwt_identities() -> anyhow::Result<()> {
    let app = TestApp::with_config(|c| c.auth.jwt_secret = Some(JWT_SECRET.to_string())).await?;
    let world = World::seed(&app).await?;
    let keys = JwtKeys::new(JWT_SECRET.as_bytes(), None);
    let exp = (Utc::now() + Duration::hours(1)).timestamp();

    let agent = keys.sign(&SessionClaims {
        sub: None,
        user_id: Some(world.alice),
        role: "Agent".into(),
        is_admin: false,
        exp,
        iss: None,
        customer_login: None,
        company_id: None,
    })?;
    let resp = app
        .get(&format!("/api/v1/tickets/{}", world.first_ticket), Some(&agent))
        .await?;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.get("/api/v1/whoami", Some(&agent)).await?;
    assert_eq!(resp.body["credential_prefix"], format!("jwt:{}", world.alice));

    let customer = keys.sign(&SessionClaims {
        sub: Some(world.xena.to_string()),
        user_id: None,
        role: "Customer".into(),
        is_admin: false,
        exp,
        iss: None,
        customer_login: Some("xena".into()),
        company_id: Some("acme".into()),
    })?;
    let resp = app
        .get(&format!("/api/v1/tickets/{}", world.acme_ticket), Some(&customer))
        .await?;
    assert_eq!(resp.status, StatusCode::OK);

    let stale = keys.sign(&SessionClaims {
        sub: None,
        user_id: Some(world.alice),
        role: "Agent".into(),
        is_admin: false,
        exp: (Utc::now() - Duration::hours(1)).timestamp(),
        iss: None,
        customer_login: None,
        company_id: None,
    })?;
    let resp = app.get("/api/v1/whoami", Some(&stale)).await?;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_code(), Some("core:token_expired"));
    Ok(())
}

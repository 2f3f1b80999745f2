//! In-process test application.

use axum::Router;
use axum::body::Body;
use chrono::{DateTime, Utc};
use deskgate::auth::{IdentityKind, token};
use deskgate::config::Config;
use deskgate::db::{Database, NewToken};
use deskgate::http::{AppState, build_router};
use deskgate::security::RateLimiter;
use http::{HeaderMap, Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// bcrypt's minimum cost keeps hashing fast in tests.
pub const TEST_HASH_COST: u32 = 4;

/// Options for a token written straight to the store.
#[allow(dead_code)]
pub struct SeedToken<'a> {
    pub owner_id: i64,
    pub owner_kind: IdentityKind,
    pub scopes: &'a [&'a str],
    pub rate_limit: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

#[allow(dead_code)]
impl<'a> SeedToken<'a> {
    pub fn agent(owner_id: i64) -> Self {
        Self {
            owner_id,
            owner_kind: IdentityKind::Agent,
            scopes: &[],
            rate_limit: token::DEFAULT_RATE_LIMIT,
            expires_at: None,
        }
    }

    pub fn customer(owner_id: i64) -> Self {
        Self {
            owner_kind: IdentityKind::Customer,
            ..Self::agent(owner_id)
        }
    }

    pub fn scopes(mut self, scopes: &'a [&'a str]) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// A router plus the database behind it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub db: Database,
    pub limiter: Arc<RateLimiter>,
}

/// A buffered response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `error.code` from a rejection body.
    pub fn error_code(&self) -> Option<&str> {
        self.body["error"]["code"].as_str()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Build an app after adjusting the default configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        let mut config = Config::default();
        config.auth.token_hash_cost = TEST_HASH_COST;
        adjust(&mut config);

        let db = Database::new(":memory:").await?;
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.window()));
        let state = AppState::from_config(&config, db.clone(), Arc::clone(&limiter));
        let router = build_router(state.clone());

        Ok(Self {
            router,
            state,
            db,
            limiter,
        })
    }

    /// Write a token directly to the store and return the raw credential.
    pub async fn seed_token(&self, seed: SeedToken<'_>) -> anyhow::Result<String> {
        let generated = token::generate();
        let hash = bcrypt::hash(&generated.raw, TEST_HASH_COST)?;
        let scopes: Vec<String> = seed.scopes.iter().map(|s| s.to_string()).collect();
        self.db
            .tokens()
            .insert(&NewToken {
                owner_id: seed.owner_id,
                owner_kind: seed.owner_kind,
                name: "seeded",
                prefix: &generated.prefix,
                token_hash: &hash,
                scopes: &scopes,
                rate_limit: seed.rate_limit,
                expires_at: seed.expires_at,
            })
            .await?;
        Ok(generated.raw)
    }

    /// Seed a token and revoke it.
    pub async fn seed_revoked_token(&self, seed: SeedToken<'_>) -> anyhow::Result<String> {
        let (owner, kind) = (seed.owner_id, seed.owner_kind);
        let raw = self.seed_token(seed).await?;
        let prefix = token::lookup_prefix(&raw).unwrap_or_default().to_string();
        let stored = self.db.tokens().find_by_prefix(&prefix).await?;
        for candidate in stored {
            self.db
                .tokens()
                .revoke(candidate.record.id, owner, kind, Utc::now())
                .await?;
        }
        Ok(raw)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> anyhow::Result<TestResponse> {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> anyhow::Result<TestResponse> {
        self.send(Method::DELETE, uri, token, None).await
    }

    pub async fn patch(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> anyhow::Result<TestResponse> {
        self.send(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn post(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> anyhow::Result<TestResponse> {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Send one request through a clone of the router.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> anyhow::Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }
}

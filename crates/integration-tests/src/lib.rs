//! Test harness: the real router over an in-memory SQLite store, the memory
//! cache, real Argon2 and JWT adapters, and a notifier that records every
//! invitation instead of delivering it.
#![cfg(feature = "web-axum")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_adapters::middleware::BasicCredentials;
use api_adapters::{AppState, Metrics};
use async_trait::async_trait;
use auth_adapters::{Argon2PasswordHasher, JwtAuthenticator, JwtConfig};
use axum::body::{to_bytes, Body};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use domains::{AccountCache, AccountId, InvitationNotice, InvitationNotifier, Result};
use serde_json::Value;
use services::{AccountService, FeedService, FollowService, PostService};
use storage_adapters::{FixedWindowLimiter, MemoryAccountCache, RateLimitConfig, SqliteStore};
use tower::ServiceExt;

pub const PASSWORD: &str = "hunter22";
pub const METRICS_USER: &str = "ops";
pub const METRICS_PASS: &str = "scrape-me";

#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<InvitationNotice>>,
}

impl CapturingNotifier {
    pub fn sent(&self) -> Vec<InvitationNotice> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Plaintext token of the most recent invitation sent to `email`.
    pub fn token_for(&self, email: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|n| n.email == email)
            .map(|n| n.token)
    }
}

#[async_trait]
impl InvitationNotifier for CapturingNotifier {
    async fn notify(&self, notice: &InvitationNotice) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notice.clone());
        Ok(())
    }
}

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub store: SqliteStore,
    pub notifier: Arc<CapturingNotifier>,
    pub metrics: Arc<Metrics>,
}

pub struct TestAppBuilder {
    rate_limit: RateLimitConfig,
    cache: Option<Arc<dyn AccountCache>>,
    metrics_auth: Option<BasicCredentials>,
    trust_forwarded_for: bool,
}

impl TestAppBuilder {
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn cache(mut self, cache: Arc<dyn AccountCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_metrics_auth(mut self) -> Self {
        self.metrics_auth = None;
        self
    }

    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub async fn build(self) -> TestApp {
        let store = SqliteStore::in_memory().await.expect("in-memory store");
        let notifier = Arc::new(CapturingNotifier::default());
        let metrics = Arc::new(Metrics::new());
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryAccountCache::new(Duration::from_secs(60))));
        let roles = Arc::new(store.roles());
        let posts = Arc::new(store.posts());

        let accounts = AccountService::new(
            Arc::new(store.accounts()),
            roles.clone(),
            cache,
            Arc::new(Argon2PasswordHasher::new()),
            notifier.clone(),
            chrono::Duration::hours(1),
        );
        let state = AppState {
            posts: PostService::new(posts.clone(), Arc::new(store.comments()), roles),
            feed: FeedService::new(posts),
            follows: FollowService::new(Arc::new(store.followers()), accounts.clone()),
            accounts,
            tokens: Arc::new(JwtAuthenticator::new(JwtConfig {
                secret: "integration-secret".into(),
                issuer: "rusty-social-test".into(),
                ttl: chrono::Duration::hours(1),
            })),
            limiter: Arc::new(FixedWindowLimiter::new(self.rate_limit)),
            metrics: metrics.clone(),
            metrics_auth: self.metrics_auth,
            trust_forwarded_for: self.trust_forwarded_for,
            env: "test".into(),
        };

        TestApp {
            router: api_adapters::router(state),
            store,
            notifier,
            metrics,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            rate_limit: RateLimitConfig {
                requests_per_window: 10_000,
                window: Duration::from_secs(60),
                enabled: true,
            },
            cache: None,
            metrics_auth: Some(BasicCredentials {
                user: METRICS_USER.into(),
                pass: METRICS_PASS.into(),
            }),
            trust_forwarded_for: true,
        }
    }

    pub async fn spawn() -> Self {
        Self::builder().build().await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Response {
            status,
            headers,
            body,
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");
        self.send(request).await
    }

    /// `GET /metrics`, with basic credentials when given.
    pub async fn scrape_metrics(&self, credentials: Option<(&str, &str)>) -> Response {
        let mut builder = Request::builder().method(Method::GET).uri("/metrics");
        if let Some((user, pass)) = credentials {
            let encoded = STANDARD.encode(format!("{user}:{pass}"));
            builder = builder.header(header::AUTHORIZATION, format!("Basic {encoded}"));
        }
        self.send(builder.body(Body::empty()).expect("valid request"))
            .await
    }

    pub async fn register(&self, username: &str) -> Response {
        self.call(
            Method::POST,
            "/v1/authentication/user",
            None,
            Some(serde_json::json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": PASSWORD,
            })),
        )
        .await
    }

    pub async fn activate(&self, username: &str) -> Response {
        let token = self
            .notifier
            .token_for(&format!("{username}@example.com"))
            .expect("an invitation was sent");
        self.call(Method::PUT, &format!("/v1/users/activate/{token}"), None, None)
            .await
    }

    pub async fn login(&self, username: &str) -> Response {
        self.call(
            Method::POST,
            "/v1/authentication/token",
            None,
            Some(serde_json::json!({
                "email": format!("{username}@example.com"),
                "password": PASSWORD,
            })),
        )
        .await
    }

    /// Registers, activates and logs in; returns the account id and a bearer token.
    pub async fn sign_up(&self, username: &str) -> (AccountId, String) {
        let registered = self.register(username).await;
        assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.body);
        let id = registered.body["data"]["id"].as_i64().expect("account id");
        assert_eq!(self.activate(username).await.status, StatusCode::NO_CONTENT);

        let login = self.login(username).await;
        assert_eq!(login.status, StatusCode::CREATED, "{:?}", login.body);
        let token = login.body["data"]["token"]
            .as_str()
            .expect("token")
            .to_string();
        (id, token)
    }

    /// Changes an account's role behind the API's back. Call before the
    /// account is first read through the cache.
    pub async fn set_role(&self, id: AccountId, role: &str) {
        sqlx::query("UPDATE users SET role_id = (SELECT id FROM roles WHERE name = ?) WHERE id = ?")
            .bind(role)
            .bind(id)
            .execute(self.store.pool())
            .await
            .expect("role update");
    }

    pub async fn create_post(&self, token: &str, title: &str, tags: &[&str]) -> Value {
        let response = self
            .call(
                Method::POST,
                "/v1/posts",
                Some(token),
                Some(serde_json::json!({
                    "title": title,
                    "content": format!("body of {title}"),
                    "tags": tags,
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["data"].clone()
    }
}

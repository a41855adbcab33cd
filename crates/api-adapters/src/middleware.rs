//! Request pipeline: observation, admission control and authentication.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use domains::{Account, DomainError};
use tracing::{debug, error, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, inserted by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Account);

/// Counts every response and logs failed ones with the request they answered.
/// Server errors keep their full detail here; the client only sees a generic body.
pub async fn observe(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = next.run(req).await;
    let status = response.status();
    state.metrics.record_request(method.as_str(), status.as_u16());

    if let Some(err) = response.extensions().get::<DomainError>() {
        if err.is_conflict() {
            state.metrics.conflicts.inc();
        }
        if status.is_server_error() {
            error!(%method, %path, status = status.as_u16(), error = %err, "request failed");
        } else {
            debug!(%method, %path, status = status.as_u16(), error = %err, "request rejected");
        }
    }
    response
}

/// Caller identity for rate limiting: the first `X-Forwarded-For` hop when
/// the header is trusted, else the socket peer, else a shared `"unknown"`
/// bucket.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .filter(|_| trust_forwarded)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());

    match (forwarded, peer) {
        (Some(hop), _) => hop.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(req.headers(), peer, state.trust_forwarded_for);

    if state.limiter.allow(&key) {
        return next.run(req).await;
    }

    state.metrics.rate_limited.inc();
    warn!(client = %key, path = %req.uri().path(), "rate limit exceeded");
    ApiError::rate_limited(state.limiter.retry_after().as_secs().max(1)).into_response()
}

/// Username and password accepted on the operational endpoints.
#[derive(Clone)]
pub struct BasicCredentials {
    pub user: String,
    pub pass: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let encoded = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Guards `/metrics` with HTTP basic auth. Answers 401 with a `Basic`
/// challenge when the credentials are missing or wrong.
pub async fn basic_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let accepted = match (&state.metrics_auth, basic_credentials(req.headers())) {
        (Some(expected), Some((user, pass))) => user == expected.user && pass == expected.pass,
        _ => false,
    };
    if accepted {
        return next.run(req).await;
    }

    warn!(path = %req.uri().path(), "basic auth rejected");
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(r#"Basic realm="metrics", charset="UTF-8""#),
    );
    response
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves the bearer token to an active account through the cache-aside
/// read path and exposes it as [`CurrentUser`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| DomainError::Unauthorized("missing bearer token".into()))?;
    let account_id = state.tokens.verify(token)?;

    let account = match state.accounts.get_account(account_id).await {
        Ok(account) => account,
        Err(DomainError::NotFound(_)) => {
            return Err(DomainError::Unauthorized("account is not active".into()).into())
        }
        Err(other) => return Err(other.into()),
    };

    req.extensions_mut().insert(CurrentUser(account));
    Ok(next.run(req).await)
}

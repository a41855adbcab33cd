use std::sync::Arc;

use domains::{RateLimiter, TokenAuthenticator};
use services::{AccountService, FeedService, FollowService, PostService};

use crate::metrics::Metrics;
use crate::middleware::BasicCredentials;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub posts: PostService,
    pub feed: FeedService,
    pub follows: FollowService,
    pub tokens: Arc<dyn TokenAuthenticator>,
    pub limiter: Arc<dyn RateLimiter>,
    pub metrics: Arc<Metrics>,
    /// `/metrics` is mounted only when set.
    pub metrics_auth: Option<BasicCredentials>,
    /// Whether `X-Forwarded-For` identifies the caller for rate limiting.
    pub trust_forwarded_for: bool,
    /// Deployment name reported by `/v1/health`.
    pub env: String,
}

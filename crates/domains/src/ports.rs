//! # Ports
//!
//! Every adapter crate implements one or more of these traits; services only
//! ever see `Arc<dyn Trait>`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::Result;
use crate::models::{
    Account, AccountId, Comment, CommentWithAuthor, FeedItem, FeedQuery, InvitationNotice,
    NewAccount, NewComment, NewInvitation, NewPost, Post, PostId, Role,
};

/// Credential store plus the invitation ledger it shares a transaction with.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Inserts an inactive account and its invitation in one transaction.
    async fn create_and_invite(
        &self,
        account: NewAccount,
        invitation: NewInvitation,
    ) -> Result<Account>;

    /// Active accounts only.
    async fn get_by_id(&self, id: AccountId) -> Result<Account>;

    /// Active accounts only.
    async fn get_by_email(&self, email: &str) -> Result<Account>;

    /// Resolves a live invitation, flips the account active and consumes the
    /// invitation, all or nothing.
    async fn activate(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Account>;

    async fn delete(&self, id: AccountId) -> Result<()>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RoleRepo: Send + Sync {
    async fn get_by_name(&self, name: &str) -> Result<Role>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn create(&self, post: NewPost) -> Result<Post>;
    async fn get_by_id(&self, id: PostId) -> Result<Post>;
    async fn delete_by_id(&self, id: PostId) -> Result<()>;

    /// Conditional write: only applies if the stored version still equals
    /// `post.version`. Returns the post with its new version and timestamp.
    async fn patch(&self, post: &Post) -> Result<Post>;

    async fn feed(&self, user_id: AccountId, query: &FeedQuery) -> Result<Vec<FeedItem>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn create(&self, comment: NewComment) -> Result<Comment>;
    async fn list_by_post(&self, post_id: PostId) -> Result<Vec<CommentWithAuthor>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FollowRepo: Send + Sync {
    async fn follow(&self, follower: AccountId, followed: AccountId) -> Result<()>;
    async fn unfollow(&self, follower: AccountId, followed: AccountId) -> Result<()>;
}

/// Failures of the cache tier. Never surfaced past the service layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("account has no valid identity and cannot be cached")]
    Unkeyable,

    #[error("cache backend unavailable: {0}")]
    Backend(String),

    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
}

/// Side-car cache of account snapshots. Never loads from the store itself.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AccountCache: Send + Sync {
    /// `Ok(None)` is a miss.
    async fn get(&self, id: AccountId) -> std::result::Result<Option<Account>, CacheError>;
    async fn set(&self, account: &Account) -> std::result::Result<(), CacheError>;
    async fn invalidate(&self, id: AccountId) -> std::result::Result<(), CacheError>;
}

/// Per-caller admission control. Denial is an outcome, not an error.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait RateLimiter: Send + Sync {
    fn allow(&self, key: &str) -> bool;

    /// How long a denied caller should wait before trying again.
    fn retry_after(&self) -> Duration;
}

/// Opaque one-way password transform. Implementations are CPU-bound and
/// must keep that work off the async executor.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plaintext: &str) -> Result<String>;
    async fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// Issues and checks bearer tokens for authenticated requests.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenAuthenticator: Send + Sync {
    fn issue(&self, account_id: AccountId) -> Result<String>;
    fn verify(&self, token: &str) -> Result<AccountId>;
}

/// Fire-and-forget delivery of activation tokens.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait InvitationNotifier: Send + Sync {
    async fn notify(&self, notice: &InvitationNotice) -> Result<()>;
}

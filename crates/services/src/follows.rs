//! Follow graph workflows.

use std::sync::Arc;

use domains::{AccountId, DomainError, FollowRepo, Result};
use tracing::debug;

use crate::accounts::AccountService;

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowRepo>,
    accounts: AccountService,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowRepo>, accounts: AccountService) -> Self {
        Self { follows, accounts }
    }

    /// The target must be an active account. Following twice is a `Conflict`.
    pub async fn follow(&self, follower: AccountId, followed: AccountId) -> Result<()> {
        reject_self(follower, followed)?;
        self.accounts.get_account(followed).await?;
        self.follows.follow(follower, followed).await?;
        debug!(follower, followed, "follow edge created");
        Ok(())
    }

    /// Removing an edge that does not exist is `NotFound`.
    pub async fn unfollow(&self, follower: AccountId, followed: AccountId) -> Result<()> {
        reject_self(follower, followed)?;
        self.follows.unfollow(follower, followed).await?;
        debug!(follower, followed, "follow edge removed");
        Ok(())
    }
}

fn reject_self(follower: AccountId, followed: AccountId) -> Result<()> {
    if follower == followed {
        return Err(DomainError::Validation("accounts cannot follow themselves".into()));
    }
    Ok(())
}

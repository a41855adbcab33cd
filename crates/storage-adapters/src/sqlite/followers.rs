use async_trait::async_trait;
use chrono::Utc;
use domains::{AccountId, DomainError, FollowRepo, Result};

use super::error::{is_foreign_key_violation, translate, unique_violation};
use super::SqliteStore;

pub struct SqliteFollowRepo {
    store: SqliteStore,
}

impl SqliteFollowRepo {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FollowRepo for SqliteFollowRepo {
    async fn follow(&self, follower: AccountId, followed: AccountId) -> Result<()> {
        self.store
            .timed("follow", async {
                sqlx::query(
                    "INSERT INTO followers (follower_id, followed_id, created_at) VALUES (?, ?, ?)",
                )
                .bind(follower)
                .bind(followed)
                .bind(Utc::now())
                .execute(self.store.pool())
                .await
                .map_err(|e| {
                    if unique_violation(&e).is_some() {
                        DomainError::Conflict("already following".into())
                    } else if is_foreign_key_violation(&e) {
                        DomainError::NotFound("account")
                    } else {
                        translate(e, "follow")
                    }
                })
            })
            .await?;
        Ok(())
    }

    async fn unfollow(&self, follower: AccountId, followed: AccountId) -> Result<()> {
        let removed = self
            .store
            .timed("unfollow", async {
                sqlx::query("DELETE FROM followers WHERE follower_id = ? AND followed_id = ?")
                    .bind(follower)
                    .bind(followed)
                    .execute(self.store.pool())
                    .await
                    .map_err(|e| translate(e, "follow"))
            })
            .await?
            .rows_affected();

        if removed == 0 {
            return Err(DomainError::NotFound("follow"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::testing::active_account;

    #[tokio::test]
    async fn follow_twice_conflicts_and_unfollow_twice_is_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        let alice = active_account(&store, "alice").await;
        let bob = active_account(&store, "bob").await;
        let repo = store.followers();

        repo.follow(alice.id, bob.id).await.unwrap();
        assert!(matches!(
            repo.follow(alice.id, bob.id).await,
            Err(DomainError::Conflict(_))
        ));

        repo.unfollow(alice.id, bob.id).await.unwrap();
        assert_eq!(
            repo.unfollow(alice.id, bob.id).await.unwrap_err(),
            DomainError::NotFound("follow")
        );
    }

    #[tokio::test]
    async fn following_unknown_account_is_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        let alice = active_account(&store, "alice").await;

        assert_eq!(
            store.followers().follow(alice.id, 4242).await.unwrap_err(),
            DomainError::NotFound("account")
        );
    }
}

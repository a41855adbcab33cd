//! Read-only feed projection.

use std::sync::Arc;

use domains::{AccountId, FeedItem, FeedQuery, PostRepo, Result};

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostRepo>,
}

impl FeedService {
    pub fn new(posts: Arc<dyn PostRepo>) -> Self {
        Self { posts }
    }

    /// Posts by `user_id` and everyone they follow, each with its comment
    /// count, ordered by creation time and then id in the requested direction.
    pub async fn feed(&self, user_id: AccountId, query: &FeedQuery) -> Result<Vec<FeedItem>> {
        query.validate()?;
        self.posts.feed(user_id, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{DomainError, MockPostRepo, SortDirection};

    #[tokio::test]
    async fn invalid_pages_are_rejected_before_the_store() {
        let mut posts = MockPostRepo::new();
        posts.expect_feed().never();
        let service = FeedService::new(Arc::new(posts));

        let query = FeedQuery {
            limit: 500,
            ..Default::default()
        };
        let err = service.feed(1, &query).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn valid_queries_pass_through() {
        let mut posts = MockPostRepo::new();
        posts
            .expect_feed()
            .withf(|user, q| *user == 1 && q.limit == 2 && q.sort == SortDirection::Asc)
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        let service = FeedService::new(Arc::new(posts));

        let query = FeedQuery {
            limit: 2,
            sort: SortDirection::Asc,
            ..Default::default()
        };
        assert!(service.feed(1, &query).await.unwrap().is_empty());
    }
}

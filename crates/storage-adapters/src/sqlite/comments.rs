use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{Comment, CommentRepo, CommentWithAuthor, DomainError, NewComment, PostId, Result};

use super::error::{is_foreign_key_violation, translate};
use super::SqliteStore;

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    user_id: i64,
    content: String,
    created_at: DateTime<Utc>,
    author_username: String,
}

impl From<CommentRow> for CommentWithAuthor {
    fn from(row: CommentRow) -> Self {
        Self {
            comment: Comment {
                id: row.id,
                post_id: row.post_id,
                author_id: row.user_id,
                content: row.content,
                created_at: row.created_at,
            },
            author_username: row.author_username,
        }
    }
}

pub struct SqliteCommentRepo {
    store: SqliteStore,
}

impl SqliteCommentRepo {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    async fn insert(&self, comment: NewComment) -> Result<Comment> {
        let created_at = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO comments (post_id, user_id, content, created_at) \
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .bind(created_at)
        .fetch_one(self.store.pool())
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                DomainError::NotFound("post")
            } else {
                translate(e, "comment")
            }
        })?;

        Ok(Comment {
            id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            content: comment.content,
            created_at,
        })
    }

    async fn select_for_post(&self, post_id: PostId) -> Result<Vec<CommentWithAuthor>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, \
             u.username AS author_username \
             FROM comments c JOIN users u ON u.id = c.user_id \
             WHERE c.post_id = ? \
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(post_id)
        .fetch_all(self.store.pool())
        .await
        .map_err(|e| translate(e, "comment"))?;

        Ok(rows.into_iter().map(CommentWithAuthor::from).collect())
    }
}

#[async_trait]
impl CommentRepo for SqliteCommentRepo {
    async fn create(&self, comment: NewComment) -> Result<Comment> {
        self.store.timed("create_comment", self.insert(comment)).await
    }

    async fn list_by_post(&self, post_id: PostId) -> Result<Vec<CommentWithAuthor>> {
        self.store
            .timed("list_comments", self.select_for_post(post_id))
            .await
    }
}

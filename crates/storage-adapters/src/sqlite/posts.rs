//! Content store with optimistic concurrency.
//!
//! `patch` is a compare-and-swap on the `version` column evaluated by the
//! engine in a single statement. No row matching `(id, version)` means either
//! a concurrent writer moved the version on or the post is gone; both are
//! reported as `Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    AccountId, DomainError, FeedItem, FeedQuery, NewPost, Post, PostId, PostRepo, Result,
};

use super::error::{is_foreign_key_violation, translate};
use super::SqliteStore;

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: i64,
    user_id: i64,
    title: String,
    content: String,
    tags: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = DomainError;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            author_id: row.user_id,
            title: row.title,
            content: row.content,
            tags: decode_tags(&row.tags)?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FeedRow {
    #[sqlx(flatten)]
    post: PostRow,
    author_username: String,
    comment_count: i64,
}

// Tags are an ordered JSON array so duplicates and order survive the round trip.
fn encode_tags(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags).map_err(DomainError::internal)
}

fn decode_tags(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| DomainError::internal(format!("corrupt tags column: {e}")))
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn feed_sql(query: &FeedQuery) -> String {
    let direction = query.sort.as_sql();
    format!(
        r#"SELECT p.id, p.user_id, p.title, p.content, p.tags, p.version, p.created_at, p.updated_at,
                  u.username AS author_username,
                  (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
           FROM posts p
           JOIN users u ON u.id = p.user_id
           WHERE (p.user_id = ?1
                  OR p.user_id IN (SELECT followed_id FROM followers WHERE follower_id = ?1))
             AND (?2 IS NULL OR p.title LIKE ?2 ESCAPE '\' OR p.content LIKE ?2 ESCAPE '\')
             AND (json_array_length(?3) = 0
                  OR EXISTS (SELECT 1 FROM json_each(p.tags) t
                             WHERE t.value IN (SELECT value FROM json_each(?3))))
           ORDER BY p.created_at {direction}, p.id {direction}
           LIMIT ?4 OFFSET ?5"#
    )
}

pub struct SqlitePostRepo {
    store: SqliteStore,
}

impl SqlitePostRepo {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    async fn insert(&self, post: NewPost) -> Result<Post> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (user_id, title, content, tags, version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 1, ?, ?) RETURNING id",
        )
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(encode_tags(&post.tags)?)
        .bind(now)
        .bind(now)
        .fetch_one(self.store.pool())
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                DomainError::NotFound("account")
            } else {
                translate(e, "post")
            }
        })?;

        Ok(Post {
            id,
            author_id: post.author_id,
            title: post.title,
            content: post.content,
            tags: post.tags,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    async fn select(&self, id: PostId) -> Result<Post> {
        sqlx::query_as::<_, PostRow>(
            "SELECT id, user_id, title, content, tags, version, created_at, updated_at \
             FROM posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.store.pool())
        .await
        .map_err(|e| translate(e, "post"))?
        .ok_or(DomainError::NotFound("post"))?
        .try_into()
    }

    async fn compare_and_swap(&self, post: &Post) -> Result<Post> {
        let swapped: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
            "UPDATE posts SET title = ?, content = ?, tags = ?, \
             version = version + 1, updated_at = ? \
             WHERE id = ? AND version = ? \
             RETURNING version, updated_at",
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(encode_tags(&post.tags)?)
        .bind(Utc::now())
        .bind(post.id)
        .bind(post.version)
        .fetch_optional(self.store.pool())
        .await
        .map_err(|e| translate(e, "post"))?;

        let (version, updated_at) = swapped.ok_or_else(|| {
            DomainError::Conflict(format!(
                "post {} changed since version {} was read",
                post.id, post.version
            ))
        })?;

        Ok(Post {
            version,
            updated_at,
            ..post.clone()
        })
    }

    async fn select_feed(&self, user_id: AccountId, query: &FeedQuery) -> Result<Vec<FeedItem>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);
        let tags = encode_tags(&query.tags)?;
        let sql = feed_sql(query);

        let rows = sqlx::query_as::<_, FeedRow>(&sql)
            .bind(user_id)
            .bind(search)
            .bind(tags)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(self.store.pool())
            .await
            .map_err(|e| translate(e, "feed"))?;

        rows.into_iter()
            .map(|row| {
                Ok(FeedItem {
                    post: row.post.try_into()?,
                    author_username: row.author_username,
                    comment_count: row.comment_count,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PostRepo for SqlitePostRepo {
    async fn create(&self, post: NewPost) -> Result<Post> {
        self.store.timed("create_post", self.insert(post)).await
    }

    async fn get_by_id(&self, id: PostId) -> Result<Post> {
        self.store.timed("get_post", self.select(id)).await
    }

    /// Hard delete. Zero affected rows is `NotFound`, never a silent success.
    async fn delete_by_id(&self, id: PostId) -> Result<()> {
        let deleted = self
            .store
            .timed("delete_post", async {
                sqlx::query("DELETE FROM posts WHERE id = ?")
                    .bind(id)
                    .execute(self.store.pool())
                    .await
                    .map_err(|e| translate(e, "post"))
            })
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(DomainError::NotFound("post"));
        }
        Ok(())
    }

    async fn patch(&self, post: &Post) -> Result<Post> {
        self.store.timed("patch_post", self.compare_and_swap(post)).await
    }

    async fn feed(&self, user_id: AccountId, query: &FeedQuery) -> Result<Vec<FeedItem>> {
        self.store.timed("feed", self.select_feed(user_id, query)).await
    }
}

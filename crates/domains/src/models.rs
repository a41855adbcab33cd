//! # Domain Models
//!
//! These structs represent the core entities of rusty-social.
//! Identifiers are store-assigned integers; timestamps are always UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

pub type AccountId = i64;
pub type PostId = i64;
pub type CommentId = i64;

/// Largest page a feed request may ask for.
pub const MAX_FEED_LIMIT: i64 = 20;

/// A permission tier. Higher `level` implies every lower tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub level: i32,
    pub description: String,
}

impl Role {
    pub const USER: &'static str = "user";
    pub const MODERATOR: &'static str = "moderator";
    pub const ADMIN: &'static str = "admin";
}

/// A registered user.
///
/// The password hash never leaves the process: it is skipped on
/// serialization, so API responses and cache snapshots only carry the
/// public fields. An account read back from the cache has an empty hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_active: bool,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Input for the registration transaction. The password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_name: String,
}

/// Ledger entry written alongside a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvitation {
    /// Hex SHA-256 of the plaintext token; the plaintext is never stored.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// What the notification collaborator needs to deliver an activation link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationNotice {
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: AccountId,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Bumped by exactly one on every successful patch.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub author_id: AccountId,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Partial update of a post. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    /// The version the client last saw, if it wants the check pushed to it.
    pub expected_version: Option<i64>,
}

impl PostChanges {
    pub fn apply(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(tags) = &self.tags {
            post.tags = tags.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: AccountId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub post_id: PostId,
    pub author_id: AccountId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: String,
}

/// A feed row: the post plus the data the feed joins in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(DomainError::Validation(format!(
                "sort must be 'asc' or 'desc', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

/// Pagination, ordering and filters for a user's feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub limit: i64,
    pub offset: i64,
    pub sort: SortDirection,
    /// Plain substring filter on title or content. Does not rank.
    pub search: Option<String>,
    /// Keep posts carrying at least one of these tags. Empty means no filter.
    pub tags: Vec<String>,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: MAX_FEED_LIMIT,
            offset: 0,
            sort: SortDirection::Desc,
            search: None,
            tags: Vec::new(),
        }
    }
}

impl FeedQuery {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(1..=MAX_FEED_LIMIT).contains(&self.limit) {
            return Err(DomainError::Validation(format!(
                "limit must be between 1 and {MAX_FEED_LIMIT}"
            )));
        }
        if self.offset < 0 {
            return Err(DomainError::Validation("offset must not be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_account() -> Account {
        Account {
            id: 7,
            username: "ferris".into(),
            email: "ferris@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            is_active: true,
            role: Role {
                id: 1,
                name: Role::USER.into(),
                level: 1,
                description: String::new(),
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let json = serde_json::to_string(&sample_account()).unwrap();
        assert!(!json.contains("argon2"));

        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 7);
        assert!(back.password_hash.is_empty());
    }

    #[test]
    fn sort_direction_only_accepts_asc_and_desc() {
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert_eq!("desc".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!(matches!(
            "DESC; DROP TABLE posts".parse::<SortDirection>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn feed_query_bounds() {
        assert!(FeedQuery::default().validate().is_ok());
        let zero = FeedQuery { limit: 0, ..Default::default() };
        assert!(zero.validate().is_err());
        let huge = FeedQuery { limit: MAX_FEED_LIMIT + 1, ..Default::default() };
        assert!(huge.validate().is_err());
        let negative = FeedQuery { offset: -1, ..Default::default() };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn changes_only_touch_given_fields() {
        let now = Utc::now();
        let mut post = Post {
            id: 1,
            author_id: 7,
            title: "old".into(),
            content: "body".into(),
            tags: vec!["a".into()],
            version: 3,
            created_at: now,
            updated_at: now,
        };
        PostChanges { title: Some("new".into()), ..Default::default() }.apply(&mut post);
        assert_eq!(post.title, "new");
        assert_eq!(post.content, "body");
        assert_eq!(post.tags, vec!["a".to_string()]);
        assert_eq!(post.version, 3);
    }
}

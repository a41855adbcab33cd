//! Request and response bodies, with the shape checks every request passes
//! before it reaches a service.

use domains::{DomainError, FeedQuery, PostChanges, Result, SortDirection, MAX_FEED_LIMIT};
use serde::{Deserialize, Serialize};

pub const MAX_USERNAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 3;
pub const MAX_PASSWORD_LEN: usize = 72;
pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_CONTENT_LEN: usize = 1000;
pub const MAX_COMMENT_LEN: usize = 1000;

/// Success bodies are wrapped as `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

pub fn envelope<T>(data: T) -> Envelope<T> {
    Envelope { data }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn at_most(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(DomainError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserPayload {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterUserPayload {
    pub fn validate(&self) -> Result<()> {
        required("username", &self.username)?;
        at_most("username", &self.username, MAX_USERNAME_LEN)?;
        validate_email(&self.email)?;
        let len = self.password.chars().count();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
            return Err(DomainError::Validation(format!(
                "password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<()> {
    required("email", email)?;
    at_most("email", email, MAX_EMAIL_LEN)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(DomainError::Validation("email is not a valid address".into())),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenPayload {
    pub email: String,
    pub password: String,
}

impl CreateTokenPayload {
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        required("password", &self.password)?;
        at_most("password", &self.password, MAX_PASSWORD_LEN)
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostPayload {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreatePostPayload {
    pub fn validate(&self) -> Result<()> {
        required("title", &self.title)?;
        at_most("title", &self.title, MAX_TITLE_LEN)?;
        required("content", &self.content)?;
        at_most("content", &self.content, MAX_CONTENT_LEN)
    }
}

/// Every field is optional; `version` is the version the client last saw.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostPayload {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub version: Option<i64>,
}

impl UpdatePostPayload {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            required("title", title)?;
            at_most("title", title, MAX_TITLE_LEN)?;
        }
        if let Some(content) = &self.content {
            required("content", content)?;
            at_most("content", content, MAX_CONTENT_LEN)?;
        }
        Ok(())
    }

    pub fn into_changes(self) -> PostChanges {
        PostChanges {
            title: self.title,
            content: self.content,
            tags: self.tags,
            expected_version: self.version,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentPayload {
    pub content: String,
}

impl CreateCommentPayload {
    pub fn validate(&self) -> Result<()> {
        required("content", &self.content)?;
        at_most("content", &self.content, MAX_COMMENT_LEN)
    }
}

/// Raw feed query string. Everything arrives as text so that a malformed
/// value is reported as a validation error naming the parameter.
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub sort: Option<String>,
    pub search: Option<String>,
    /// Comma-separated.
    pub tags: Option<String>,
}

fn parse_number(field: &str, raw: Option<&str>, default: i64) -> Result<i64> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|_| DomainError::Validation(format!("{field} must be an integer"))),
    }
}

impl FeedParams {
    pub fn into_query(self) -> Result<FeedQuery> {
        let query = FeedQuery {
            limit: parse_number("limit", self.limit.as_deref(), MAX_FEED_LIMIT)?,
            offset: parse_number("offset", self.offset.as_deref(), 0)?,
            sort: match self.sort.as_deref().map(str::trim) {
                None | Some("") => SortDirection::default(),
                Some(raw) => raw.parse()?,
            },
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            tags: self
                .tags
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };
        query.validate()?;
        Ok(query)
    }
}

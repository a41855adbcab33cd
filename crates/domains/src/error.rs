//! # DomainError
//!
//! Centralized error handling for the rusty-social workspace.
//! Adapters translate backend failures into these variants at their boundary,
//! so no `sqlx` or Redis error shape ever reaches a service or handler.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Entity absent, expired, or filtered out (e.g. an inactive account).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness violation or a write against a stale version.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("a user with that username already exists")]
    DuplicateUsername,

    #[error("a user with that email already exists")]
    DuplicateEmail,

    /// Admission denied by the rate limiter.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Input rejected before it reached a store (bad sort key, self-follow, ...).
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Infrastructure failure (store down, timeout, broken transaction).
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn internal(context: impl std::fmt::Display) -> Self {
        Self::Internal(context.to_string())
    }

    /// True for every flavour of conflict, including the registration duplicates.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Conflict(_) | Self::DuplicateUsername | Self::DuplicateEmail
        )
    }
}

/// A specialized Result type for domain logic.
pub type Result<T> = std::result::Result<T, DomainError>;

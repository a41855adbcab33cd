//! Translation of `sqlx` failures into `DomainError`.
//!
//! SQLite reports no constraint names, only `UNIQUE constraint failed:
//! users.email`, so the violated target is taken from the constraint name
//! when the engine has one and from the message otherwise.

use domains::DomainError;
use sqlx::error::ErrorKind;
use tracing::error;

/// `Some(target)` if `err` is a uniqueness violation.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    let sqlx::Error::Database(db) = err else {
        return None;
    };
    let unique = matches!(db.kind(), ErrorKind::UniqueViolation)
        || db.message().contains("UNIQUE constraint failed");
    if !unique {
        return None;
    }
    Some(
        db.constraint()
            .map(str::to_owned)
            .unwrap_or_else(|| db.message().to_owned()),
    )
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.kind(), ErrorKind::ForeignKeyViolation)
                || db.message().contains("FOREIGN KEY constraint failed")
        }
        _ => false,
    }
}

/// Fallback translation. `resource` names the entity a missing row refers to.
pub(crate) fn translate(err: sqlx::Error, resource: &'static str) -> DomainError {
    if matches!(err, sqlx::Error::RowNotFound) {
        return DomainError::NotFound(resource);
    }
    if unique_violation(&err).is_some() {
        return DomainError::Conflict(format!("{resource} already exists"));
    }
    if is_foreign_key_violation(&err) {
        return DomainError::NotFound(resource);
    }
    error!(resource, error = %err, "sqlite operation failed");
    DomainError::Internal(format!("{resource} store failure"))
}

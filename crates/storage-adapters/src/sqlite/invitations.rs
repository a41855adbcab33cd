//! The invitation ledger.
//!
//! Only reachable through the registration and activation transactions in
//! `accounts`; every function takes the transaction's connection.

use chrono::{DateTime, Utc};
use domains::{AccountId, DomainError, NewInvitation, Result};
use sqlx::SqliteConnection;

use super::error::{translate, unique_violation};

pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    account_id: AccountId,
    invitation: &NewInvitation,
) -> Result<()> {
    sqlx::query("INSERT INTO user_invitations (token_hash, user_id, expiry) VALUES (?, ?, ?)")
        .bind(&invitation.token_hash)
        .bind(account_id)
        .bind(invitation.expires_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => DomainError::Conflict("invitation token already issued".into()),
            None => translate(e, "invitation"),
        })?;
    Ok(())
}

/// The account a live invitation authorizes. Expired rows are ignored even
/// if they have not been cleaned up.
pub(crate) async fn resolve(
    conn: &mut SqliteConnection,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<AccountId> {
    sqlx::query_scalar::<_, i64>(
        "SELECT user_id FROM user_invitations WHERE token_hash = ? AND expiry > ?",
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| translate(e, "invitation"))?
    .ok_or(DomainError::NotFound("invitation"))
}

pub(crate) async fn delete_for_account(
    conn: &mut SqliteConnection,
    account_id: AccountId,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM user_invitations WHERE user_id = ?")
        .bind(account_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| translate(e, "invitation"))?;
    Ok(result.rows_affected())
}

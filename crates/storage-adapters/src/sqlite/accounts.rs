//! Credential store.
//!
//! Lookups filter on `is_active = 1` in SQL, so an inactive account is
//! indistinguishable from a missing one everywhere except inside the
//! activation transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Account, AccountId, AccountRepo, DomainError, NewAccount, NewInvitation, Result, Role,
};
use sqlx::{Executor, Sqlite};

use super::error::{translate, unique_violation};
use super::{invitations, roles, SqliteStore};

const SELECT_ACCOUNT: &str = "SELECT u.id, u.username, u.email, u.password_hash, u.is_active, \
     u.created_at, r.id AS role_id, r.name AS role_name, r.level AS role_level, \
     r.description AS role_description \
     FROM users u JOIN roles r ON r.id = u.role_id";

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    role_id: i64,
    role_name: String,
    role_level: i32,
    role_description: String,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            is_active: row.is_active,
            role: Role {
                id: row.role_id,
                name: row.role_name,
                level: row.role_level,
                description: row.role_description,
            },
            created_at: row.created_at,
        }
    }
}

async fn fetch_active_by_id<'e, E>(executor: E, id: AccountId) -> Result<Account>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{SELECT_ACCOUNT} WHERE u.id = ? AND u.is_active = 1");
    sqlx::query_as::<_, AccountRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(|e| translate(e, "account"))?
        .map(Account::from)
        .ok_or(DomainError::NotFound("account"))
}

async fn fetch_active_by_email<'e, E>(executor: E, email: &str) -> Result<Account>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{SELECT_ACCOUNT} WHERE u.email = ? AND u.is_active = 1");
    sqlx::query_as::<_, AccountRow>(&sql)
        .bind(email)
        .fetch_optional(executor)
        .await
        .map_err(|e| translate(e, "account"))?
        .map(Account::from)
        .ok_or(DomainError::NotFound("account"))
}

/// Maps the users-table uniqueness constraints to their precise duplicate kind.
fn map_insert_error(err: sqlx::Error) -> DomainError {
    match unique_violation(&err) {
        Some(target) if target.contains("username") => DomainError::DuplicateUsername,
        Some(target) if target.contains("email") => DomainError::DuplicateEmail,
        _ => translate(err, "account"),
    }
}

pub struct SqliteAccountRepo {
    store: SqliteStore,
}

impl SqliteAccountRepo {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    async fn create_and_invite_tx(
        &self,
        account: NewAccount,
        invitation: NewInvitation,
    ) -> Result<Account> {
        let mut tx = self.store.begin_write().await?;

        let role = roles::find_by_name(&mut *tx, &account.role_name).await?;
        let created_at = Utc::now();

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash, is_active, role_id, created_at) \
             VALUES (?, ?, ?, 0, ?, ?) RETURNING id",
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(role.id)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        invitations::insert(&mut tx, id, &invitation).await?;

        tx.commit().await.map_err(|e| translate(e, "account"))?;

        Ok(Account {
            id,
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            is_active: false,
            role,
            created_at,
        })
    }

    /// Resolve, flip, consume. Any early return drops `tx` uncommitted, which
    /// rolls every step back.
    async fn activate_tx(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Account> {
        let mut tx = self.store.begin_write().await?;

        let account_id = invitations::resolve(&mut tx, token_hash, now).await?;

        let flipped = sqlx::query("UPDATE users SET is_active = 1 WHERE id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| translate(e, "account"))?
            .rows_affected();
        if flipped == 0 {
            return Err(DomainError::NotFound("account"));
        }

        invitations::delete_for_account(&mut tx, account_id).await?;
        let account = fetch_active_by_id(&mut *tx, account_id).await?;

        tx.commit().await.map_err(|e| translate(e, "account"))?;
        Ok(account)
    }
}

#[async_trait]
impl AccountRepo for SqliteAccountRepo {
    async fn create_and_invite(
        &self,
        account: NewAccount,
        invitation: NewInvitation,
    ) -> Result<Account> {
        self.store
            .timed("create_and_invite", self.create_and_invite_tx(account, invitation))
            .await
    }

    async fn get_by_id(&self, id: AccountId) -> Result<Account> {
        self.store
            .timed("get_account", fetch_active_by_id(self.store.pool(), id))
            .await
    }

    async fn get_by_email(&self, email: &str) -> Result<Account> {
        self.store
            .timed("get_account_by_email", fetch_active_by_email(self.store.pool(), email))
            .await
    }

    async fn activate(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Account> {
        self.store
            .timed("activate", self.activate_tx(token_hash, now))
            .await
    }

    async fn delete(&self, id: AccountId) -> Result<()> {
        let deleted = self
            .store
            .timed("delete_account", async {
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(id)
                    .execute(self.store.pool())
                    .await
                    .map_err(|e| translate(e, "account"))
            })
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(DomainError::NotFound("account"));
        }
        Ok(())
    }
}

//! # SQLite adapter
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `domains` models. Every repository shares one [`SqliteStore`], which
//! owns the pool and the per-operation timeout.
//!
//! A timed-out operation is dropped mid-flight. For the transactional
//! workflows that means the `sqlx::Transaction` is dropped without `commit`,
//! which rolls it back.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use domains::{DomainError, Result};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::{info, warn};

pub mod accounts;
pub mod comments;
mod error;
pub mod followers;
mod invitations;
pub mod posts;
pub mod roles;

pub use accounts::SqliteAccountRepo;
pub use comments::SqliteCommentRepo;
pub use followers::SqliteFollowRepo;
pub use posts::SqlitePostRepo;
pub use roles::SqliteRoleRepo;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Opens (creating if needed) a file-backed database in WAL mode.
    pub async fn connect(url: &str, max_connections: u32, query_timeout: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DomainError::internal(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(query_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(query_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DomainError::internal(format!("database connection failed: {e}")))?;

        info!(max_connections, "sqlite pool ready");
        Ok(Self {
            pool,
            query_timeout,
        })
    }

    /// A private, migrated in-memory database.
    ///
    /// Every connection to `:memory:` opens a fresh empty database, so the
    /// pool is pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(DomainError::internal)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(DomainError::internal)?;

        let store = Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::internal(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a transaction holding the write lock from its first statement.
    ///
    /// Workflows that read before they write must use this: a deferred
    /// transaction cannot upgrade a snapshot another writer has moved past,
    /// and that failure bypasses the busy timeout.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| error::translate(e, "transaction"))
    }

    pub fn accounts(&self) -> SqliteAccountRepo {
        SqliteAccountRepo::new(self.clone())
    }

    pub fn roles(&self) -> SqliteRoleRepo {
        SqliteRoleRepo::new(self.clone())
    }

    pub fn posts(&self) -> SqlitePostRepo {
        SqlitePostRepo::new(self.clone())
    }

    pub fn comments(&self) -> SqliteCommentRepo {
        SqliteCommentRepo::new(self.clone())
    }

    pub fn followers(&self) -> SqliteFollowRepo {
        SqliteFollowRepo::new(self.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Bounds a store operation by the configured timeout.
    pub(crate) async fn timed<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "store operation timed out"
                );
                Err(DomainError::Internal(format!("{operation} timed out")))
            }
        }
    }
}

/// Test helpers shared by the repository test modules.
#[cfg(test)]
pub(crate) mod testing {
    use chrono::{Duration, Utc};
    use domains::{Account, AccountRepo, NewAccount, NewInvitation, Role};
    use tempfile::TempDir;

    use super::SqliteStore;

    pub(crate) fn new_account(name: &str) -> NewAccount {
        NewAccount {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "hash".into(),
            role_name: Role::USER.into(),
        }
    }

    pub(crate) fn invitation(token_hash: &str, ttl: Duration) -> NewInvitation {
        NewInvitation {
            token_hash: token_hash.to_string(),
            expires_at: Utc::now() + ttl,
        }
    }

    /// A migrated file-backed store with a pool of `connections`. The
    /// directory must outlive the store.
    pub(crate) async fn file_backed(connections: u32) -> (TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("social.db").display());
        let store = SqliteStore::connect(&url, connections, std::time::Duration::from_secs(5))
            .await
            .unwrap();
        store.migrate().await.unwrap();
        (dir, store)
    }

    /// Registers and activates an account in one go.
    pub(crate) async fn active_account(store: &SqliteStore, name: &str) -> Account {
        let repo = store.accounts();
        let hash = format!("token-{name}");
        repo.create_and_invite(new_account(name), invitation(&hash, Duration::hours(1)))
            .await
            .unwrap();
        repo.activate(&hash, Utc::now()).await.unwrap()
    }
}

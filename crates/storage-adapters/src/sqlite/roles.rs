use async_trait::async_trait;
use domains::{DomainError, Result, Role, RoleRepo};
use sqlx::{Executor, Sqlite};

use super::error::translate;
use super::SqliteStore;

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    level: i32,
    description: String,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            level: row.level,
            description: row.description,
        }
    }
}

/// Usable on the pool or inside an open transaction.
pub(crate) async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Role>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, RoleRow>("SELECT id, name, level, description FROM roles WHERE name = ?")
        .bind(name)
        .fetch_optional(executor)
        .await
        .map_err(|e| translate(e, "role"))?
        .map(Role::from)
        .ok_or(DomainError::NotFound("role"))
}

pub struct SqliteRoleRepo {
    store: SqliteStore,
}

impl SqliteRoleRepo {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RoleRepo for SqliteRoleRepo {
    async fn get_by_name(&self, name: &str) -> Result<Role> {
        self.store
            .timed("get_role", find_by_name(self.store.pool(), name))
            .await
    }
}

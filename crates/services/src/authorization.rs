//! Role-level checks shared by the post and account workflows.

use domains::{Account, DomainError, Result, RoleRepo};

/// Succeeds when `actor` holds `required` or any higher role.
pub async fn require_role(roles: &dyn RoleRepo, actor: &Account, required: &str) -> Result<()> {
    let role = roles.get_by_name(required).await?;
    if actor.role.level >= role.level {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!("requires the '{required}' role")))
    }
}

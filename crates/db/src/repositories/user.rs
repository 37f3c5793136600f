use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use procflow_core::domain::user::{OrgId, Role, User, UserId};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role_str: String =
        row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let approval_limit_str: String =
        row.try_get("approval_limit").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let org_id: String =
        row.try_get("org_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let role = Role::parse(&role_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown role `{role_str}`")))?;
    let approval_limit = Decimal::from_str(&approval_limit_str)
        .map_err(|e| RepositoryError::Decode(format!("approval_limit: {e}")))?;

    Ok(User { id: UserId(id), role, approval_limit, org_id: OrgId(org_id) })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, role, approval_limit, org_id FROM app_user WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO app_user (id, role, approval_limit, org_id)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 role = excluded.role,
                 approval_limit = excluded.approval_limit,
                 org_id = excluded.org_id",
        )
        .bind(&user.id.0)
        .bind(user.role.as_str())
        .bind(user.approval_limit.to_string())
        .bind(&user.org_id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

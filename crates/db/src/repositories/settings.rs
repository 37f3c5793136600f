use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use procflow_core::policy::ProgramSettings;

use super::{RepositoryError, SettingsRepository};
use crate::DbPool;

/// The settings table holds a single row (id = 1); the schema enforces it.
pub struct SqlSettingsRepository {
    pool: DbPool,
}

impl SqlSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_settings(row: &sqlx::sqlite::SqliteRow) -> Result<ProgramSettings, RepositoryError> {
    let micro_purchase_limit_str: String = row
        .try_get("micro_purchase_limit")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let blocked_merchants_str: String =
        row.try_get("blocked_merchants").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let split_purchase_window_days: i64 = row
        .try_get("split_purchase_window_days")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let micro_purchase_limit = Decimal::from_str(&micro_purchase_limit_str)
        .map_err(|e| RepositoryError::Decode(format!("micro_purchase_limit: {e}")))?;
    let blocked_merchants: Vec<String> = serde_json::from_str(&blocked_merchants_str)
        .map_err(|e| RepositoryError::Decode(format!("blocked_merchants: {e}")))?;
    let split_purchase_window_days = u32::try_from(split_purchase_window_days)
        .map_err(|e| RepositoryError::Decode(format!("split_purchase_window_days: {e}")))?;

    Ok(ProgramSettings { micro_purchase_limit, blocked_merchants, split_purchase_window_days })
}

#[async_trait::async_trait]
impl SettingsRepository for SqlSettingsRepository {
    async fn load(&self) -> Result<Option<ProgramSettings>, RepositoryError> {
        let row = sqlx::query(
            "SELECT micro_purchase_limit, blocked_merchants, split_purchase_window_days
             FROM program_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_settings(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, settings: ProgramSettings) -> Result<(), RepositoryError> {
        let blocked_merchants = serde_json::to_string(&settings.blocked_merchants)
            .map_err(|e| RepositoryError::Decode(format!("blocked_merchants: {e}")))?;

        sqlx::query(
            "INSERT INTO program_settings (id, micro_purchase_limit, blocked_merchants,
                                           split_purchase_window_days)
             VALUES (1, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 micro_purchase_limit = excluded.micro_purchase_limit,
                 blocked_merchants = excluded.blocked_merchants,
                 split_purchase_window_days = excluded.split_purchase_window_days",
        )
        .bind(settings.micro_purchase_limit.to_string())
        .bind(&blocked_merchants)
        .bind(i64::from(settings.split_purchase_window_days))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

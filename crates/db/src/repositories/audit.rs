use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use procflow_core::audit::AuditEvent;

use super::{AuditRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditRepository {
    pool: DbPool,
}

impl SqlAuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let event_id: String =
        row.try_get("event_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let entity: String =
        row.try_get("entity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let entity_id: String =
        row.try_get("entity_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor_uid: String =
        row.try_get("actor_uid").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let action: String =
        row.try_get("action").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let correlation_id: String =
        row.try_get("correlation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let details_str: String =
        row.try_get("details").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let occurred_at_str: String =
        row.try_get("occurred_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let details: BTreeMap<String, String> = serde_json::from_str(&details_str)
        .map_err(|e| RepositoryError::Decode(format!("details: {e}")))?;
    let occurred_at = DateTime::parse_from_rfc3339(&occurred_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("occurred_at: {e}")))?;

    Ok(AuditEvent {
        event_id,
        entity,
        entity_id,
        actor_uid,
        action,
        correlation_id,
        details,
        occurred_at,
    })
}

#[async_trait::async_trait]
impl AuditRepository for SqlAuditRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        let details = serde_json::to_string(&event.details)
            .map_err(|e| RepositoryError::Decode(format!("details: {e}")))?;

        sqlx::query(
            "INSERT INTO audit_event (event_id, entity, entity_id, actor_uid, action,
                                      correlation_id, details, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(&event.entity)
        .bind(&event.entity_id)
        .bind(&event.actor_uid)
        .bind(&event.action)
        .bind(&event.correlation_id)
        .bind(&details)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_entity(
        &self,
        entity: &str,
        entity_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT event_id, entity, entity_id, actor_uid, action, correlation_id,
                    details, occurred_at
             FROM audit_event
             WHERE entity = ? AND entity_id = ?
             ORDER BY occurred_at DESC
             LIMIT ?",
        )
        .bind(entity)
        .bind(entity_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect::<Result<Vec<_>, _>>()
    }
}

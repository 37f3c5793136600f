use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use procflow_core::domain::request::{PurchaseRequest, RequestId, RequestStatus};
use procflow_core::domain::user::{OrgId, UserId};

use super::{RepositoryError, RequestRepository};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<PurchaseRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let vendor: String =
        row.try_get("vendor").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_estimate_str: String =
        row.try_get("total_estimate").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requester_id: String =
        row.try_get("requester_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let org_id: String =
        row.try_get("org_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let payload_str: String =
        row.try_get("payload").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = RequestStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown request status `{status_str}`")))?;
    let total_estimate = Decimal::from_str(&total_estimate_str)
        .map_err(|e| RepositoryError::Decode(format!("total_estimate: {e}")))?;
    let payload = serde_json::from_str(&payload_str)
        .map_err(|e| RepositoryError::Decode(format!("payload: {e}")))?;

    Ok(PurchaseRequest {
        id: RequestId(id),
        status,
        vendor,
        total_estimate,
        requester_id: UserId(requester_id),
        org_id: OrgId(org_id),
        payload,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
        updated_at: parse_timestamp(&updated_at_str, "updated_at")?,
    })
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<PurchaseRequest>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, status, vendor, total_estimate, requester_id, org_id,
                    payload, created_at, updated_at
             FROM purchase_request WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, request: PurchaseRequest) -> Result<(), RepositoryError> {
        let payload_str = serde_json::to_string(&request.payload)
            .map_err(|e| RepositoryError::Decode(format!("payload: {e}")))?;

        sqlx::query(
            "INSERT INTO purchase_request (id, status, vendor, total_estimate, requester_id,
                                           org_id, payload, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 vendor = excluded.vendor,
                 total_estimate = excluded.total_estimate,
                 requester_id = excluded.requester_id,
                 org_id = excluded.org_id,
                 payload = excluded.payload,
                 updated_at = excluded.updated_at",
        )
        .bind(&request.id.0)
        .bind(request.status.as_str())
        .bind(&request.vendor)
        .bind(request.total_estimate.to_string())
        .bind(&request.requester_id.0)
        .bind(&request.org_id.0)
        .bind(&payload_str)
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn transition_status(
        &self,
        id: &RequestId,
        expected_from: RequestStatus,
        to: RequestStatus,
        payload: &serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let payload_str = serde_json::to_string(payload)
            .map_err(|e| RepositoryError::Decode(format!("payload: {e}")))?;

        let result = sqlx::query(
            "UPDATE purchase_request
             SET status = ?, payload = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(&payload_str)
        .bind(updated_at.to_rfc3339())
        .bind(&id.0)
        .bind(expected_from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_recent_for_requester_vendor(
        &self,
        requester_id: &UserId,
        vendor: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PurchaseRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, status, vendor, total_estimate, requester_id, org_id,
                    payload, created_at, updated_at
             FROM purchase_request
             WHERE requester_id = ? AND LOWER(TRIM(vendor)) = ? AND created_at >= ?
             ORDER BY created_at ASC",
        )
        .bind(&requester_id.0)
        .bind(vendor.trim().to_ascii_lowercase())
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }
}

//! Deterministic demo dataset for the CLI `seed` command and smoke checks.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;

use procflow_core::domain::request::{PurchaseRequest, RequestId, RequestStatus};
use procflow_core::domain::user::{OrgId, Role, User, UserId};
use procflow_core::policy::ProgramSettings;

use crate::repositories::{
    RepositoryError, RequestRepository, SettingsRepository, SqlRequestRepository,
    SqlSettingsRepository, SqlUserRepository, UserRepository,
};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub requests: usize,
    pub settings_seeded: bool,
}

fn demo_settings() -> ProgramSettings {
    ProgramSettings {
        micro_purchase_limit: Decimal::new(1_000_000, 2),
        blocked_merchants: vec!["Acme Casino".to_string()],
        split_purchase_window_days: 30,
    }
}

fn demo_users() -> Vec<User> {
    let org = OrgId("org-demo".to_string());
    vec![
        User {
            id: UserId("u-requester".to_string()),
            role: Role::Requester,
            approval_limit: Decimal::ZERO,
            org_id: org.clone(),
        },
        User {
            id: UserId("u-approver".to_string()),
            role: Role::Approver,
            approval_limit: Decimal::new(300_000, 2),
            org_id: org.clone(),
        },
        User {
            id: UserId("u-cardholder".to_string()),
            role: Role::Cardholder,
            approval_limit: Decimal::ZERO,
            org_id: org.clone(),
        },
        User {
            id: UserId("u-auditor".to_string()),
            role: Role::Auditor,
            approval_limit: Decimal::ZERO,
            org_id: org.clone(),
        },
        User {
            id: UserId("u-admin".to_string()),
            role: Role::Admin,
            approval_limit: Decimal::ZERO,
            org_id: org,
        },
    ]
}

fn demo_requests() -> Vec<PurchaseRequest> {
    let now = Utc::now();
    vec![PurchaseRequest {
        id: RequestId("REQ-DEMO-0001".to_string()),
        status: RequestStatus::Draft,
        vendor: "Office Depot".to_string(),
        total_estimate: Decimal::new(45_000, 2),
        requester_id: UserId("u-requester".to_string()),
        org_id: OrgId("org-demo".to_string()),
        payload: json!({ "justification": "replacement toner cartridges" }),
        created_at: now,
        updated_at: now,
    }]
}

/// Idempotent: every record upserts, so reseeding an existing database is
/// safe.
pub async fn seed_demo_data(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let settings_repo = SqlSettingsRepository::new(pool.clone());
    settings_repo.save(demo_settings()).await?;

    let user_repo = SqlUserRepository::new(pool.clone());
    let users = demo_users();
    for user in &users {
        user_repo.save(user.clone()).await?;
    }

    let request_repo = SqlRequestRepository::new(pool.clone());
    let requests = demo_requests();
    for request in &requests {
        request_repo.save(request.clone()).await?;
    }

    Ok(SeedSummary { users: users.len(), requests: requests.len(), settings_seeded: true })
}

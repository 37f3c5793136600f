use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use procflow_core::audit::AuditEvent;
use procflow_core::domain::request::{PurchaseRequest, RequestId, RequestStatus};
use procflow_core::domain::user::{User, UserId};
use procflow_core::policy::ProgramSettings;

pub mod audit;
pub mod memory;
pub mod request;
pub mod settings;
pub mod user;

pub use audit::SqlAuditRepository;
pub use memory::{
    InMemoryAuditRepository, InMemoryRequestRepository, InMemorySettingsRepository,
    InMemoryUserRepository,
};
pub use request::SqlRequestRepository;
pub use settings::SqlSettingsRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId)
        -> Result<Option<PurchaseRequest>, RepositoryError>;

    async fn save(&self, request: PurchaseRequest) -> Result<(), RepositoryError>;

    /// Conditional status commit: the row is updated only while its stored
    /// status still equals `expected_from`. Returns `false` when another
    /// writer got there first, leaving the row untouched.
    async fn transition_status(
        &self,
        id: &RequestId,
        expected_from: RequestStatus,
        to: RequestStatus,
        payload: &serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Requests by the same requester to the same vendor (matched
    /// case-insensitively) created at or after `since`. Feeds split-purchase
    /// detection.
    async fn list_recent_for_requester_vendor(
        &self,
        requester_id: &UserId,
        vendor: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PurchaseRequest>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// The program settings singleton; `None` when it has not been seeded.
    async fn load(&self) -> Result<Option<ProgramSettings>, RepositoryError>;
    async fn save(&self, settings: ProgramSettings) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Append-only: there is deliberately no update or delete operation.
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError>;

    async fn list_for_entity(
        &self,
        entity: &str,
        entity_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, RepositoryError>;
}

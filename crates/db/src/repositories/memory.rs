use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use procflow_core::audit::AuditEvent;
use procflow_core::domain::request::{PurchaseRequest, RequestId, RequestStatus};
use procflow_core::domain::user::{User, UserId};
use procflow_core::policy::ProgramSettings;

use super::{
    AuditRepository, RepositoryError, RequestRepository, SettingsRepository, UserRepository,
};

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, PurchaseRequest>>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<PurchaseRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn save(&self, request: PurchaseRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
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
        let mut requests = self.requests.write().await;
        // Same compare-and-swap semantics as the SQL implementation.
        match requests.get_mut(&id.0) {
            Some(stored) if stored.status == expected_from => {
                stored.status = to;
                stored.payload = payload.clone();
                stored.updated_at = updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_recent_for_requester_vendor(
        &self,
        requester_id: &UserId,
        vendor: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PurchaseRequest>, RepositoryError> {
        let vendor_key = vendor.trim().to_ascii_lowercase();
        let requests = self.requests.read().await;

        let mut matches: Vec<PurchaseRequest> = requests
            .values()
            .filter(|request| request.requester_id == *requester_id)
            .filter(|request| request.vendor.trim().to_ascii_lowercase() == vendor_key)
            .filter(|request| request.created_at >= since)
            .cloned()
            .collect();
        matches.sort_by(|left, right| left.created_at.cmp(&right.created_at));

        Ok(matches)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        users.insert(user.id.0.clone(), user);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySettingsRepository {
    settings: RwLock<Option<ProgramSettings>>,
}

impl InMemorySettingsRepository {
    pub fn with_settings(settings: ProgramSettings) -> Self {
        Self { settings: RwLock::new(Some(settings)) }
    }
}

#[async_trait::async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn load(&self) -> Result<Option<ProgramSettings>, RepositoryError> {
        let settings = self.settings.read().await;
        Ok(settings.clone())
    }

    async fn save(&self, settings: ProgramSettings) -> Result<(), RepositoryError> {
        let mut stored = self.settings.write().await;
        *stored = Some(settings);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuditRepository {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditRepository {
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait::async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        let mut events = self.events.write().await;
        events.push(event);
        Ok(())
    }

    async fn list_for_entity(
        &self,
        entity: &str,
        entity_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let events = self.events.read().await;
        let mut matches: Vec<AuditEvent> = events
            .iter()
            .filter(|event| event.entity == entity && event.entity_id == entity_id)
            .cloned()
            .collect();
        matches.sort_by(|left, right| right.occurred_at.cmp(&left.occurred_at));
        matches.truncate(limit as usize);
        Ok(matches)
    }
}

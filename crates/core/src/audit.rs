use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One append-only trail entry. Created once per attempted state change and
/// never mutated afterwards; retention is a compliance concern handled
/// outside this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub entity: String,
    pub entity_id: String,
    pub actor_uid: String,
    pub action: String,
    pub correlation_id: String,
    pub details: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        entity: impl Into<String>,
        entity_id: impl Into<String>,
        actor_uid: impl Into<String>,
        action: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            entity: entity.into(),
            entity_id: entity_id.into(),
            actor_uid: actor_uid.into(),
            action: action.into(),
            correlation_id: correlation_id.into(),
            details: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::AuditEvent;

    #[test]
    fn events_carry_identity_and_ordered_details() {
        let event = AuditEvent::new(
            "purchase_request",
            "REQ-2026-0042",
            "u-approver",
            "request.transition_applied",
            "req-123",
        )
        .with_detail("to", "approved")
        .with_detail("from", "ao_review");

        assert!(!event.event_id.is_empty());
        assert_eq!(event.entity, "purchase_request");
        assert_eq!(event.correlation_id, "req-123");
        // BTreeMap keeps detail ordering stable for serialization.
        let keys: Vec<&str> = event.details.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["from", "to"]);
    }

    #[test]
    fn each_event_gets_a_distinct_id() {
        let first = AuditEvent::new("purchase_request", "REQ-1", "u-1", "a", "c-1");
        let second = AuditEvent::new("purchase_request", "REQ-1", "u-1", "a", "c-1");
        assert_ne!(first.event_id, second.event_id);
    }
}

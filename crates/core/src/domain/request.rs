use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::user::{OrgId, UserId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Submitted,
    AoReview,
    Approved,
    Denied,
    Returned,
    CardholderPurchasing,
    Purchased,
    Reconciled,
    Closed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::AoReview => "ao_review",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Returned => "returned",
            Self::CardholderPurchasing => "cardholder_purchasing",
            Self::Purchased => "purchased",
            Self::Reconciled => "reconciled",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "ao_review" => Some(Self::AoReview),
            "approved" => Some(Self::Approved),
            "denied" => Some(Self::Denied),
            "returned" => Some(Self::Returned),
            "cardholder_purchasing" => Some(Self::CardholderPurchasing),
            "purchased" => Some(Self::Purchased),
            "reconciled" => Some(Self::Reconciled),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: RequestId,
    pub status: RequestStatus,
    pub vendor: String,
    pub total_estimate: Decimal,
    pub requester_id: UserId,
    pub org_id: OrgId,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseRequest {
    /// Shallow-merges a JSON object patch into the request payload.
    /// Patch keys overwrite existing payload keys; other keys are preserved.
    pub fn merge_payload(&mut self, patch: &Value) -> Result<(), DomainError> {
        let Some(incoming) = patch.as_object() else {
            return Err(DomainError::InvariantViolation(
                "request payload patch must be a JSON object".to_string(),
            ));
        };

        if !self.payload.is_object() {
            self.payload = Value::Object(serde_json::Map::new());
        }
        let target = self
            .payload
            .as_object_mut()
            .ok_or_else(|| DomainError::InvariantViolation("payload is not an object".into()))?;

        for (key, value) in incoming {
            target.insert(key.clone(), value.clone());
        }

        Ok(())
    }
}

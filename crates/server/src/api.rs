//! RPC boundary for request state transitions and audit-trail reads.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use procflow_core::audit::AuditEvent;
use procflow_core::domain::request::{PurchaseRequest, RequestId, RequestStatus};
use procflow_core::domain::user::UserId;
use procflow_core::errors::ApplicationError;
use procflow_core::policy::PolicyFinding;
use procflow_db::repositories::{AuditRepository, RequestRepository};
use procflow_workflow::{
    TransitionCommand, TransitionService, TransitionServiceError, AUDIT_ENTITY_REQUEST,
};

const ACTOR_HEADER: &str = "x-actor-uid";
const CORRELATION_HEADER: &str = "x-correlation-id";
const AUDIT_TRAIL_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct ApiState {
    service: Arc<TransitionService>,
    requests: Arc<dyn RequestRepository>,
    audit: Arc<dyn AuditRepository>,
}

impl ApiState {
    pub fn new(
        service: Arc<TransitionService>,
        requests: Arc<dyn RequestRepository>,
        audit: Arc<dyn AuditRepository>,
    ) -> Self {
        Self { service, requests, audit }
    }

    pub fn service(&self) -> &TransitionService {
        &self.service
    }
}

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub target_status: String,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransitionAccepted {
    pub success: bool,
    pub request_id: String,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub policy_checks: Vec<PolicyFinding>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: &'static str,
    pub reason: String,
    pub policy_checks: Vec<PolicyFinding>,
}

type Rejection = (StatusCode, Json<ApiError>);

fn rejection(
    status: StatusCode,
    error: &'static str,
    reason: impl Into<String>,
    policy_checks: Vec<PolicyFinding>,
) -> Rejection {
    (status, Json(ApiError { success: false, error, reason: reason.into(), policy_checks }))
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/requests/{id}/transition", post(transition))
        .route("/api/requests/{id}", get(get_request))
        .route("/api/requests/{id}/audit", get(get_audit_trail))
        .with_state(state)
}

pub async fn serve<S>(
    bind_address: &str,
    port: u16,
    state: ApiState,
    shutdown: S,
) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.api.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "transition api started"
    );

    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await
}

pub async fn transition(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<TransitionBody>,
) -> Result<Json<TransitionAccepted>, Rejection> {
    let correlation_id = correlation_id(&headers);

    let Some(actor_uid) = header_value(&headers, ACTOR_HEADER) else {
        return Err(rejection(
            StatusCode::BAD_REQUEST,
            "missing_actor",
            format!("`{ACTOR_HEADER}` header is required"),
            Vec::new(),
        ));
    };

    let Some(target_status) = RequestStatus::parse(&body.target_status) else {
        return Err(rejection(
            StatusCode::BAD_REQUEST,
            "unknown_status",
            format!("`{}` is not a request status", body.target_status),
            Vec::new(),
        ));
    };

    let command = TransitionCommand {
        request_id: RequestId(id),
        target_status,
        actor_uid: UserId(actor_uid),
        payload: body.payload,
        comment: body.comment,
        correlation_id: correlation_id.clone(),
    };

    match state.service.execute(command).await {
        Ok(response) => Ok(Json(TransitionAccepted {
            success: true,
            request_id: response.request_id.0,
            from: response.from,
            to: response.to,
            policy_checks: response.policy_checks,
        })),
        Err(error) => Err(map_service_error(error, &correlation_id)),
    }
}

pub async fn get_request(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<PurchaseRequest>, Rejection> {
    let found = state.requests.find_by_id(&RequestId(id.clone())).await.map_err(|error| {
        error!(
            event_name = "api.request_read_failed",
            request_id = %id,
            error = %error,
            "failed to read purchase request"
        );
        persistence_rejection(error.to_string(), "unassigned")
    })?;

    found.map(Json).ok_or_else(|| {
        rejection(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("purchase request `{id}` was not found"),
            Vec::new(),
        )
    })
}

pub async fn get_audit_trail(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditEvent>>, Rejection> {
    let trail = state
        .audit
        .list_for_entity(AUDIT_ENTITY_REQUEST, &id, AUDIT_TRAIL_LIMIT)
        .await
        .map_err(|error| {
            error!(
                event_name = "api.audit_read_failed",
                request_id = %id,
                error = %error,
                "failed to read audit trail"
            );
            persistence_rejection(error.to_string(), "unassigned")
        })?;

    Ok(Json(trail))
}

fn map_service_error(error: TransitionServiceError, correlation_id: &str) -> Rejection {
    match error {
        TransitionServiceError::RequestNotFound(_) | TransitionServiceError::ActorNotFound(_) => {
            rejection(StatusCode::NOT_FOUND, "not_found", error.to_string(), Vec::new())
        }
        TransitionServiceError::Transition(inner) => rejection(
            StatusCode::BAD_REQUEST,
            "invalid_transition",
            inner.to_string(),
            Vec::new(),
        ),
        TransitionServiceError::Domain(inner) => {
            rejection(StatusCode::BAD_REQUEST, "invalid_payload", inner.to_string(), Vec::new())
        }
        TransitionServiceError::PolicyRejected { findings } => {
            let reason = findings
                .iter()
                .map(|finding| finding.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            rejection(StatusCode::UNPROCESSABLE_ENTITY, "policy_violation", reason, findings)
        }
        TransitionServiceError::Conflict { .. } => {
            rejection(StatusCode::CONFLICT, "conflict", error.to_string(), Vec::new())
        }
        TransitionServiceError::Repository(inner) => {
            error!(
                event_name = "api.transition_persistence_failed",
                correlation_id = %correlation_id,
                error = %inner,
                "transition failed on persistence"
            );
            persistence_rejection(inner.to_string(), correlation_id)
        }
    }
}

fn persistence_rejection(detail: String, correlation_id: &str) -> Rejection {
    // Surface the user-safe message, keep the raw detail in the log line.
    let interface = ApplicationError::Persistence(detail).into_interface(correlation_id);
    rejection(
        StatusCode::SERVICE_UNAVAILABLE,
        "persistence_unavailable",
        interface.user_message(),
        Vec::new(),
    )
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn correlation_id(headers: &HeaderMap) -> String {
    header_value(headers, CORRELATION_HEADER).unwrap_or_else(|| Uuid::new_v4().to_string())
}

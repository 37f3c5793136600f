//! Orchestrates request state transitions: load records, run the pure
//! state-machine and policy checks, then commit, audit, and notify.
//!
//! Failure isolation contract: the conditional status commit is the
//! authoritative outcome. Audit-append and notification failures after the
//! commit are logged and swallowed; they never surface as a transition
//! failure. Rejections (invalid edge, policy error, lost race) happen before
//! any write to the request row.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use procflow_core::audit::AuditEvent;
use procflow_core::domain::request::{PurchaseRequest, RequestId, RequestStatus};
use procflow_core::domain::user::{User, UserId};
use procflow_core::errors::DomainError;
use procflow_core::lifecycle::{validate_transition, TransitionContext, TransitionError};
use procflow_core::policy::{
    evaluate_policy_checks, has_blocking_finding, PolicyFinding, Severity,
};
use procflow_db::repositories::{
    AuditRepository, RepositoryError, RequestRepository, SettingsRepository, UserRepository,
};
use procflow_notify::{Notifier, TransitionNotification};

pub const AUDIT_ENTITY_REQUEST: &str = "purchase_request";
pub const ACTION_TRANSITION_APPLIED: &str = "request.transition_applied";
pub const ACTION_TRANSITION_REJECTED: &str = "request.transition_rejected";

#[derive(Clone, Debug, PartialEq)]
pub struct TransitionCommand {
    pub request_id: RequestId,
    pub target_status: RequestStatus,
    pub actor_uid: UserId,
    pub payload: Option<Value>,
    pub comment: Option<String>,
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransitionResponse {
    pub request_id: RequestId,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub policy_checks: Vec<PolicyFinding>,
}

#[derive(Debug, Error)]
pub enum TransitionServiceError {
    #[error("purchase request `{0}` was not found")]
    RequestNotFound(String),
    #[error("acting user `{0}` was not found")]
    ActorNotFound(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("policy checks rejected the transition ({} blocking finding(s))", blocking_count(.findings))]
    PolicyRejected { findings: Vec<PolicyFinding> },
    #[error("request `{request_id}` changed while the transition was in flight")]
    Conflict { request_id: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn blocking_count(findings: &[PolicyFinding]) -> usize {
    findings.iter().filter(|finding| finding.severity == Severity::Error).count()
}

pub struct TransitionService {
    requests: Arc<dyn RequestRepository>,
    users: Arc<dyn UserRepository>,
    settings: Arc<dyn SettingsRepository>,
    audit: Arc<dyn AuditRepository>,
    notifier: Arc<dyn Notifier>,
}

impl TransitionService {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        users: Arc<dyn UserRepository>,
        settings: Arc<dyn SettingsRepository>,
        audit: Arc<dyn AuditRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { requests, users, settings, audit, notifier }
    }

    pub async fn execute(
        &self,
        command: TransitionCommand,
    ) -> Result<TransitionResponse, TransitionServiceError> {
        let request = self
            .requests
            .find_by_id(&command.request_id)
            .await?
            .ok_or_else(|| TransitionServiceError::RequestNotFound(command.request_id.0.clone()))?;
        let actor = self
            .users
            .find_by_id(&command.actor_uid)
            .await?
            .ok_or_else(|| TransitionServiceError::ActorNotFound(command.actor_uid.0.clone()))?;

        let context = TransitionContext {
            amount: request.total_estimate,
            approval_limit: actor.approval_limit,
            actor_org: actor.org_id.clone(),
            request_org: request.org_id.clone(),
        };

        let outcome = match validate_transition(
            request.status,
            command.target_status,
            actor.role,
            &context,
        ) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.record_rejection(&request, &actor, &command, &error.to_string(), &[]).await;
                return Err(error.into());
            }
        };

        let now = Utc::now();
        let settings = self.settings.load().await?;
        let recent = match &settings {
            Some(settings) => {
                let since = now - Duration::days(i64::from(settings.split_purchase_window_days));
                self.requests
                    .list_recent_for_requester_vendor(&request.requester_id, &request.vendor, since)
                    .await?
            }
            None => Vec::new(),
        };

        let findings = evaluate_policy_checks(&request, settings.as_ref(), &recent, now);
        if has_blocking_finding(&findings) {
            let reason = findings
                .iter()
                .map(|finding| finding.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            self.record_rejection(&request, &actor, &command, &reason, &findings).await;
            return Err(TransitionServiceError::PolicyRejected { findings });
        }

        let mut updated = request.clone();
        if let Some(patch) = &command.payload {
            updated.merge_payload(patch)?;
        }

        let committed = self
            .requests
            .transition_status(&request.id, outcome.from, outcome.to, &updated.payload, now)
            .await?;
        if !committed {
            // Another writer moved the request between our read and the
            // conditional update; nothing was written.
            return Err(TransitionServiceError::Conflict { request_id: request.id.0.clone() });
        }

        info!(
            event_name = "workflow.transition_applied",
            request_id = %request.id.0,
            correlation_id = %command.correlation_id,
            from = outcome.from.as_str(),
            to = outcome.to.as_str(),
            actor_uid = %actor.id.0,
            warnings = findings.len(),
            "request transition committed"
        );

        self.record_applied(&request, &actor, &command, &outcome.from, &outcome.to, &findings)
            .await;
        self.send_notification(&request, &actor, outcome.from, outcome.to, &findings).await;

        Ok(TransitionResponse {
            request_id: request.id,
            from: outcome.from,
            to: outcome.to,
            policy_checks: findings,
        })
    }

    async fn record_applied(
        &self,
        request: &PurchaseRequest,
        actor: &User,
        command: &TransitionCommand,
        from: &RequestStatus,
        to: &RequestStatus,
        findings: &[PolicyFinding],
    ) {
        let mut event = AuditEvent::new(
            AUDIT_ENTITY_REQUEST,
            request.id.0.clone(),
            actor.id.0.clone(),
            ACTION_TRANSITION_APPLIED,
            command.correlation_id.clone(),
        )
        .with_detail("from", from.as_str())
        .with_detail("to", to.as_str());

        if let Some(comment) = &command.comment {
            event = event.with_detail("comment", comment.clone());
        }
        if !findings.is_empty() {
            event = event.with_detail("policy_findings", render_findings(findings));
        }

        if let Err(error) = self.audit.append(event).await {
            warn!(
                event_name = "workflow.audit_append_failed",
                request_id = %request.id.0,
                correlation_id = %command.correlation_id,
                error = %error,
                "audit append failed after commit; state change stands"
            );
        }
    }

    async fn record_rejection(
        &self,
        request: &PurchaseRequest,
        actor: &User,
        command: &TransitionCommand,
        reason: &str,
        findings: &[PolicyFinding],
    ) {
        let mut event = AuditEvent::new(
            AUDIT_ENTITY_REQUEST,
            request.id.0.clone(),
            actor.id.0.clone(),
            ACTION_TRANSITION_REJECTED,
            command.correlation_id.clone(),
        )
        .with_detail("from", request.status.as_str())
        .with_detail("target", command.target_status.as_str())
        .with_detail("reason", reason);

        if !findings.is_empty() {
            event = event.with_detail("policy_findings", render_findings(findings));
        }

        if let Err(error) = self.audit.append(event).await {
            warn!(
                event_name = "workflow.audit_append_failed",
                request_id = %request.id.0,
                correlation_id = %command.correlation_id,
                error = %error,
                "audit append failed for rejected transition"
            );
        }
    }

    async fn send_notification(
        &self,
        request: &PurchaseRequest,
        actor: &User,
        from: RequestStatus,
        to: RequestStatus,
        findings: &[PolicyFinding],
    ) {
        let notification = TransitionNotification {
            request_id: request.id.0.clone(),
            from,
            to,
            actor_uid: actor.id.0.clone(),
            vendor: request.vendor.clone(),
            total_estimate: request.total_estimate,
            warnings: findings.iter().map(|finding| finding.message.clone()).collect(),
        };

        if let Err(error) = self.notifier.notify(&notification).await {
            warn!(
                event_name = "workflow.notification_failed",
                request_id = %request.id.0,
                error = %error,
                "notification delivery failed after commit; state change stands"
            );
        }
    }
}

fn render_findings(findings: &[PolicyFinding]) -> String {
    serde_json::to_string(findings).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    use procflow_core::audit::AuditEvent;
    use procflow_core::domain::request::{PurchaseRequest, RequestId, RequestStatus};
    use procflow_core::domain::user::{OrgId, Role, User, UserId};
    use procflow_core::lifecycle::TransitionError;
    use procflow_core::policy::{PolicyCheckKind, ProgramSettings, Severity};
    use procflow_db::repositories::{
        AuditRepository, InMemoryAuditRepository, InMemoryRequestRepository,
        InMemorySettingsRepository, InMemoryUserRepository, RepositoryError, RequestRepository,
        UserRepository,
    };
    use procflow_notify::{NotificationError, Notifier, TransitionNotification};

    use super::{
        TransitionCommand, TransitionService, TransitionServiceError, ACTION_TRANSITION_APPLIED,
        ACTION_TRANSITION_REJECTED,
    };

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<TransitionNotification>>,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<TransitionNotification> {
            match self.sent.lock() {
                Ok(sent) => sent.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(
            &self,
            notification: &TransitionNotification,
        ) -> Result<(), NotificationError> {
            match self.sent.lock() {
                Ok(mut sent) => sent.push(notification.clone()),
                Err(poisoned) => poisoned.into_inner().push(notification.clone()),
            }
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(
            &self,
            _notification: &TransitionNotification,
        ) -> Result<(), NotificationError> {
            Err(NotificationError::Transport("webhook unreachable".to_string()))
        }
    }

    struct FailingAuditRepository;

    #[async_trait]
    impl AuditRepository for FailingAuditRepository {
        async fn append(&self, _event: AuditEvent) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("audit store offline".to_string()))
        }

        async fn list_for_entity(
            &self,
            _entity: &str,
            _entity_id: &str,
            _limit: u32,
        ) -> Result<Vec<AuditEvent>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    /// Returns a stale snapshot on read while delegating writes, simulating
    /// a second writer landing between the read and the conditional update.
    struct StaleReadRequestRepository {
        stale: PurchaseRequest,
        inner: Arc<InMemoryRequestRepository>,
    }

    #[async_trait]
    impl RequestRepository for StaleReadRequestRepository {
        async fn find_by_id(
            &self,
            _id: &RequestId,
        ) -> Result<Option<PurchaseRequest>, RepositoryError> {
            Ok(Some(self.stale.clone()))
        }

        async fn save(&self, request: PurchaseRequest) -> Result<(), RepositoryError> {
            self.inner.save(request).await
        }

        async fn transition_status(
            &self,
            id: &RequestId,
            expected_from: RequestStatus,
            to: RequestStatus,
            payload: &serde_json::Value,
            updated_at: DateTime<Utc>,
        ) -> Result<bool, RepositoryError> {
            self.inner.transition_status(id, expected_from, to, payload, updated_at).await
        }

        async fn list_recent_for_requester_vendor(
            &self,
            requester_id: &UserId,
            vendor: &str,
            since: DateTime<Utc>,
        ) -> Result<Vec<PurchaseRequest>, RepositoryError> {
            self.inner.list_recent_for_requester_vendor(requester_id, vendor, since).await
        }
    }

    fn settings() -> ProgramSettings {
        ProgramSettings {
            micro_purchase_limit: Decimal::new(1_000_000, 2),
            blocked_merchants: vec!["Acme Casino".to_string()],
            split_purchase_window_days: 30,
        }
    }

    fn request(id: &str, status: RequestStatus, vendor: &str, total_cents: i64) -> PurchaseRequest {
        let now = Utc::now();
        PurchaseRequest {
            id: RequestId(id.to_string()),
            status,
            vendor: vendor.to_string(),
            total_estimate: Decimal::new(total_cents, 2),
            requester_id: UserId("u-requester".to_string()),
            org_id: OrgId("org-1".to_string()),
            payload: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    fn user(id: &str, role: Role, limit_cents: i64) -> User {
        User {
            id: UserId(id.to_string()),
            role,
            approval_limit: Decimal::new(limit_cents, 2),
            org_id: OrgId("org-1".to_string()),
        }
    }

    fn command(request_id: &str, target: RequestStatus, actor: &str) -> TransitionCommand {
        TransitionCommand {
            request_id: RequestId(request_id.to_string()),
            target_status: target,
            actor_uid: UserId(actor.to_string()),
            payload: None,
            comment: None,
            correlation_id: "req-test".to_string(),
        }
    }

    struct Harness {
        requests: Arc<InMemoryRequestRepository>,
        audit: Arc<InMemoryAuditRepository>,
        notifier: Arc<RecordingNotifier>,
        service: TransitionService,
    }

    async fn harness(stored: Vec<PurchaseRequest>, users: Vec<User>) -> Harness {
        let requests = Arc::new(InMemoryRequestRepository::default());
        for request in stored {
            requests.save(request).await.expect("seed request");
        }

        let user_repo = Arc::new(InMemoryUserRepository::default());
        for user in users {
            user_repo.save(user).await.expect("seed user");
        }

        let audit = Arc::new(InMemoryAuditRepository::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let service = TransitionService::new(
            requests.clone(),
            user_repo,
            Arc::new(InMemorySettingsRepository::with_settings(settings())),
            audit.clone(),
            notifier.clone(),
        );

        Harness { requests, audit, notifier, service }
    }

    #[tokio::test]
    async fn draft_submission_commits_audits_and_notifies() {
        let harness = harness(
            vec![request("REQ-1", RequestStatus::Draft, "Office Depot", 45_000)],
            vec![user("u-requester", Role::Requester, 0)],
        )
        .await;

        let response = harness
            .service
            .execute(command("REQ-1", RequestStatus::Submitted, "u-requester"))
            .await
            .expect("draft -> submitted should succeed");

        assert_eq!(response.from, RequestStatus::Draft);
        assert_eq!(response.to, RequestStatus::Submitted);
        assert!(response.policy_checks.is_empty());

        let stored = harness
            .requests
            .find_by_id(&RequestId("REQ-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.status, RequestStatus::Submitted);

        let trail = harness.audit.events().await;
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, ACTION_TRANSITION_APPLIED);
        assert_eq!(trail[0].details.get("from").map(String::as_str), Some("draft"));
        assert_eq!(trail[0].details.get("to").map(String::as_str), Some("submitted"));

        let sent = harness.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].request_id, "REQ-1");
    }

    #[tokio::test]
    async fn approval_over_limit_is_rejected_with_limit_reason() {
        let harness = harness(
            vec![request("REQ-1", RequestStatus::AoReview, "Office Depot", 500_000)],
            vec![user("u-approver", Role::Approver, 300_000)],
        )
        .await;

        let error = harness
            .service
            .execute(command("REQ-1", RequestStatus::Approved, "u-approver"))
            .await
            .expect_err("5000 over a 3000 limit must be rejected");

        assert!(matches!(
            error,
            TransitionServiceError::Transition(TransitionError::ApprovalLimitExceeded { .. })
        ));
        assert!(error.to_string().contains("exceeds approval limit"));

        let stored = harness
            .requests
            .find_by_id(&RequestId("REQ-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.status, RequestStatus::AoReview, "rejection must not mutate state");

        let trail = harness.audit.events().await;
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, ACTION_TRANSITION_REJECTED);
        assert!(harness.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn blocked_merchant_rejects_despite_a_valid_edge() {
        let harness = harness(
            vec![request("REQ-1", RequestStatus::Draft, "Acme Casino", 20_000)],
            vec![user("u-requester", Role::Requester, 0)],
        )
        .await;

        let error = harness
            .service
            .execute(command("REQ-1", RequestStatus::Submitted, "u-requester"))
            .await
            .expect_err("blocked merchant must reject the transition");

        let TransitionServiceError::PolicyRejected { findings } = error else {
            panic!("expected PolicyRejected, got another error");
        };
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, PolicyCheckKind::BlockedMerchant);
        assert_eq!(findings[0].severity, Severity::Error);

        let stored = harness
            .requests
            .find_by_id(&RequestId("REQ-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.status, RequestStatus::Draft);
        assert!(harness.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn policy_rejection_reports_every_blocking_and_warning_finding() {
        // Blocked merchant AND over the micro-purchase limit: the caller
        // gets the full list, not just the first offense.
        let harness = harness(
            vec![request("REQ-1", RequestStatus::Draft, "Acme Casino", 2_000_000)],
            vec![user("u-requester", Role::Requester, 0)],
        )
        .await;

        let error = harness
            .service
            .execute(command("REQ-1", RequestStatus::Submitted, "u-requester"))
            .await
            .expect_err("blocked merchant must reject");

        let TransitionServiceError::PolicyRejected { findings } = error else {
            panic!("expected PolicyRejected");
        };
        let kinds: Vec<PolicyCheckKind> = findings.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![PolicyCheckKind::MicroPurchaseLimit, PolicyCheckKind::BlockedMerchant]
        );
    }

    #[tokio::test]
    async fn warnings_surface_in_response_audit_and_notification() {
        let harness = harness(
            vec![request("REQ-1", RequestStatus::Draft, "Office Depot", 1_500_000)],
            vec![user("u-requester", Role::Requester, 0)],
        )
        .await;

        let response = harness
            .service
            .execute(command("REQ-1", RequestStatus::Submitted, "u-requester"))
            .await
            .expect("warnings are non-blocking");

        assert_eq!(response.policy_checks.len(), 1);
        assert_eq!(response.policy_checks[0].severity, Severity::Warning);

        let trail = harness.audit.events().await;
        assert_eq!(trail.len(), 1);
        assert!(trail[0].details.contains_key("policy_findings"));

        let sent = harness.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].warnings.len(), 1);
    }

    #[tokio::test]
    async fn split_purchases_inside_the_window_warn_but_do_not_block() {
        let now = Utc::now();
        let mut earlier = request("REQ-1", RequestStatus::Submitted, "Office Depot", 700_000);
        earlier.created_at = now - Duration::days(4);
        let current = request("REQ-2", RequestStatus::Draft, "Office Depot", 600_000);

        let harness =
            harness(vec![earlier, current], vec![user("u-requester", Role::Requester, 0)]).await;

        let response = harness
            .service
            .execute(command("REQ-2", RequestStatus::Submitted, "u-requester"))
            .await
            .expect("split-purchase warning is non-blocking");

        assert_eq!(response.policy_checks.len(), 1);
        assert_eq!(response.policy_checks[0].kind, PolicyCheckKind::SplitPurchase);
        assert_eq!(
            response.policy_checks[0].details.get("combined_total").map(String::as_str),
            Some("13000.00")
        );
    }

    #[tokio::test]
    async fn lost_race_surfaces_as_conflict_without_writes() {
        let inner = Arc::new(InMemoryRequestRepository::default());
        // The stored row has already been submitted by another writer...
        inner
            .save(request("REQ-1", RequestStatus::Submitted, "Office Depot", 45_000))
            .await
            .expect("seed");
        // ...but this caller still holds the draft snapshot.
        let stale = request("REQ-1", RequestStatus::Draft, "Office Depot", 45_000);

        let user_repo = Arc::new(InMemoryUserRepository::default());
        user_repo.save(user("u-requester", Role::Requester, 0)).await.expect("seed user");

        let audit = Arc::new(InMemoryAuditRepository::default());
        let service = TransitionService::new(
            Arc::new(StaleReadRequestRepository { stale, inner: inner.clone() }),
            user_repo,
            Arc::new(InMemorySettingsRepository::with_settings(settings())),
            audit.clone(),
            Arc::new(RecordingNotifier::default()),
        );

        let error = service
            .execute(command("REQ-1", RequestStatus::Submitted, "u-requester"))
            .await
            .expect_err("stale snapshot must lose the race");

        assert!(matches!(error, TransitionServiceError::Conflict { .. }));
        let stored = inner
            .find_by_id(&RequestId("REQ-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.status, RequestStatus::Submitted);
        assert!(audit.events().await.is_empty(), "a lost race commits nothing, audits nothing");
    }

    #[tokio::test]
    async fn audit_failure_after_commit_does_not_fail_the_transition() {
        let requests = Arc::new(InMemoryRequestRepository::default());
        requests
            .save(request("REQ-1", RequestStatus::Draft, "Office Depot", 45_000))
            .await
            .expect("seed");

        let user_repo = Arc::new(InMemoryUserRepository::default());
        user_repo.save(user("u-requester", Role::Requester, 0)).await.expect("seed user");

        let service = TransitionService::new(
            requests.clone(),
            user_repo,
            Arc::new(InMemorySettingsRepository::with_settings(settings())),
            Arc::new(FailingAuditRepository),
            Arc::new(RecordingNotifier::default()),
        );

        service
            .execute(command("REQ-1", RequestStatus::Submitted, "u-requester"))
            .await
            .expect("audit failure must not surface as a transition failure");

        let stored = requests
            .find_by_id(&RequestId("REQ-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.status, RequestStatus::Submitted);
    }

    #[tokio::test]
    async fn notification_failure_after_commit_does_not_fail_the_transition() {
        let requests = Arc::new(InMemoryRequestRepository::default());
        requests
            .save(request("REQ-1", RequestStatus::Draft, "Office Depot", 45_000))
            .await
            .expect("seed");

        let user_repo = Arc::new(InMemoryUserRepository::default());
        user_repo.save(user("u-requester", Role::Requester, 0)).await.expect("seed user");

        let service = TransitionService::new(
            requests.clone(),
            user_repo,
            Arc::new(InMemorySettingsRepository::with_settings(settings())),
            Arc::new(InMemoryAuditRepository::default()),
            Arc::new(FailingNotifier),
        );

        service
            .execute(command("REQ-1", RequestStatus::Submitted, "u-requester"))
            .await
            .expect("notification failure must not surface as a transition failure");
    }

    #[tokio::test]
    async fn missing_settings_fail_open_and_the_transition_proceeds() {
        let requests = Arc::new(InMemoryRequestRepository::default());
        requests
            .save(request("REQ-1", RequestStatus::Draft, "Acme Casino", 5_000_000))
            .await
            .expect("seed");

        let user_repo = Arc::new(InMemoryUserRepository::default());
        user_repo.save(user("u-requester", Role::Requester, 0)).await.expect("seed user");

        let service = TransitionService::new(
            requests,
            user_repo,
            Arc::new(InMemorySettingsRepository::default()),
            Arc::new(InMemoryAuditRepository::default()),
            Arc::new(RecordingNotifier::default()),
        );

        let response = service
            .execute(command("REQ-1", RequestStatus::Submitted, "u-requester"))
            .await
            .expect("absent settings must not block the transition");
        assert!(response.policy_checks.is_empty());
    }

    #[tokio::test]
    async fn payload_patch_is_merged_into_the_committed_request() {
        let harness = harness(
            vec![request("REQ-1", RequestStatus::Draft, "Office Depot", 45_000)],
            vec![user("u-requester", Role::Requester, 0)],
        )
        .await;

        let mut command = command("REQ-1", RequestStatus::Submitted, "u-requester");
        command.payload = Some(json!({ "po_number": "PO-77" }));
        command.comment = Some("resubmitting with PO".to_string());

        harness.service.execute(command).await.expect("transition with payload");

        let stored = harness
            .requests
            .find_by_id(&RequestId("REQ-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.payload["po_number"], "PO-77");

        let trail = harness.audit.events().await;
        assert_eq!(trail[0].details.get("comment").map(String::as_str), Some("resubmitting with PO"));
    }

    #[tokio::test]
    async fn unknown_request_and_actor_are_typed_not_found_errors() {
        let harness = harness(
            vec![request("REQ-1", RequestStatus::Draft, "Office Depot", 45_000)],
            vec![user("u-requester", Role::Requester, 0)],
        )
        .await;

        let missing_request = harness
            .service
            .execute(command("REQ-404", RequestStatus::Submitted, "u-requester"))
            .await
            .expect_err("unknown request");
        assert!(matches!(missing_request, TransitionServiceError::RequestNotFound(_)));

        let missing_actor = harness
            .service
            .execute(command("REQ-1", RequestStatus::Submitted, "u-ghost"))
            .await
            .expect_err("unknown actor");
        assert!(matches!(missing_actor, TransitionServiceError::ActorNotFound(_)));
    }
}

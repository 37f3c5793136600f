use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::RequestStatus;
use crate::domain::user::{OrgId, Role};

/// Context a transition is validated against. Built by the caller from the
/// stored request and the acting user; the machine itself never touches
/// storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionContext {
    pub amount: Decimal,
    pub approval_limit: Decimal,
    pub actor_org: OrgId,
    pub request_org: OrgId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub actor_role: Role,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("no transition from {from:?} to {to:?} is defined")]
    UnknownEdge { from: RequestStatus, to: RequestStatus },
    #[error("role {role:?} may not move a request from {from:?} to {to:?}")]
    RoleNotPermitted { from: RequestStatus, to: RequestStatus, role: Role },
    #[error("amount {amount} exceeds approval limit {approval_limit}")]
    ApprovalLimitExceeded { amount: Decimal, approval_limit: Decimal },
    #[error("actor org `{actor_org}` does not match request org `{request_org}`")]
    OrgMismatch { actor_org: String, request_org: String },
}

pub fn initial_status() -> RequestStatus {
    RequestStatus::Draft
}

/// Terminal states have no outgoing edges.
pub fn is_terminal(status: RequestStatus) -> bool {
    matches!(status, RequestStatus::Closed | RequestStatus::Denied)
}

fn allowed_roles(from: RequestStatus, to: RequestStatus) -> Option<&'static [Role]> {
    use RequestStatus::{
        AoReview, Approved, CardholderPurchasing, Closed, Denied, Draft, Purchased, Reconciled,
        Returned, Submitted,
    };
    use Role::{Admin, Approver, Cardholder, Requester};

    const REQUESTER: &[Role] = &[Requester, Admin];
    const APPROVER: &[Role] = &[Approver, Admin];
    const CARDHOLDER: &[Role] = &[Cardholder, Admin];

    match (from, to) {
        (Draft, Submitted) => Some(REQUESTER),
        (Submitted, AoReview) => Some(APPROVER),
        (AoReview, Approved) | (AoReview, Denied) | (AoReview, Returned) => Some(APPROVER),
        (Approved, CardholderPurchasing) => Some(CARDHOLDER),
        (CardholderPurchasing, Purchased) => Some(CARDHOLDER),
        (Purchased, Reconciled) => Some(CARDHOLDER),
        (Reconciled, Closed) => Some(CARDHOLDER),
        (Returned, Draft) | (Returned, Submitted) => Some(REQUESTER),
        _ => None,
    }
}

/// Decides whether `current -> target` is permitted for `actor_role` under
/// the given context. Pure decision function; persistence is the caller's
/// responsibility.
///
/// Check order: edge existence, role permission, approval limit (only on
/// `AoReview -> Approved` for a non-admin approver; an amount exactly equal
/// to the limit passes), then org isolation. Admin bypasses the limit and
/// org checks.
pub fn validate_transition(
    current: RequestStatus,
    target: RequestStatus,
    actor_role: Role,
    context: &TransitionContext,
) -> Result<TransitionOutcome, TransitionError> {
    let Some(roles) = allowed_roles(current, target) else {
        return Err(TransitionError::UnknownEdge { from: current, to: target });
    };

    if !roles.contains(&actor_role) {
        return Err(TransitionError::RoleNotPermitted {
            from: current,
            to: target,
            role: actor_role,
        });
    }

    if actor_role != Role::Admin {
        if current == RequestStatus::AoReview
            && target == RequestStatus::Approved
            && context.amount > context.approval_limit
        {
            return Err(TransitionError::ApprovalLimitExceeded {
                amount: context.amount,
                approval_limit: context.approval_limit,
            });
        }

        if context.actor_org != context.request_org {
            return Err(TransitionError::OrgMismatch {
                actor_org: context.actor_org.0.clone(),
                request_org: context.request_org.0.clone(),
            });
        }
    }

    Ok(TransitionOutcome { from: current, to: target, actor_role })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::request::RequestStatus;
    use crate::domain::user::{OrgId, Role};

    use super::{
        initial_status, is_terminal, validate_transition, TransitionContext, TransitionError,
    };

    const ALL_STATUSES: [RequestStatus; 10] = [
        RequestStatus::Draft,
        RequestStatus::Submitted,
        RequestStatus::AoReview,
        RequestStatus::Approved,
        RequestStatus::Denied,
        RequestStatus::Returned,
        RequestStatus::CardholderPurchasing,
        RequestStatus::Purchased,
        RequestStatus::Reconciled,
        RequestStatus::Closed,
    ];

    const TABLE: [(RequestStatus, RequestStatus, Role); 11] = [
        (RequestStatus::Draft, RequestStatus::Submitted, Role::Requester),
        (RequestStatus::Submitted, RequestStatus::AoReview, Role::Approver),
        (RequestStatus::AoReview, RequestStatus::Approved, Role::Approver),
        (RequestStatus::AoReview, RequestStatus::Denied, Role::Approver),
        (RequestStatus::AoReview, RequestStatus::Returned, Role::Approver),
        (RequestStatus::Approved, RequestStatus::CardholderPurchasing, Role::Cardholder),
        (RequestStatus::CardholderPurchasing, RequestStatus::Purchased, Role::Cardholder),
        (RequestStatus::Purchased, RequestStatus::Reconciled, Role::Cardholder),
        (RequestStatus::Reconciled, RequestStatus::Closed, Role::Cardholder),
        (RequestStatus::Returned, RequestStatus::Draft, Role::Requester),
        (RequestStatus::Returned, RequestStatus::Submitted, Role::Requester),
    ];

    fn context() -> TransitionContext {
        TransitionContext {
            amount: Decimal::new(50_000, 2),
            approval_limit: Decimal::new(300_000, 2),
            actor_org: OrgId("org-1".to_string()),
            request_org: OrgId("org-1".to_string()),
        }
    }

    fn is_defined_edge(from: RequestStatus, to: RequestStatus) -> bool {
        TABLE.iter().any(|(f, t, _)| *f == from && *t == to)
    }

    #[test]
    fn every_edge_in_the_table_is_valid_for_its_primary_role() {
        for (from, to, role) in TABLE {
            let outcome = validate_transition(from, to, role, &context())
                .unwrap_or_else(|error| panic!("{from:?} -> {to:?} as {role:?}: {error}"));
            assert_eq!(outcome.from, from);
            assert_eq!(outcome.to, to);
        }
    }

    #[test]
    fn every_pair_outside_the_table_is_rejected() {
        for from in ALL_STATUSES {
            for to in ALL_STATUSES {
                if is_defined_edge(from, to) {
                    continue;
                }
                let error = validate_transition(from, to, Role::Admin, &context())
                    .expect_err("undefined edge must be rejected");
                assert!(matches!(error, TransitionError::UnknownEdge { .. }));
            }
        }
    }

    #[test]
    fn roles_outside_the_allowed_set_are_rejected() {
        let error = validate_transition(
            RequestStatus::Draft,
            RequestStatus::Submitted,
            Role::Cardholder,
            &context(),
        )
        .expect_err("cardholder cannot submit a draft");
        assert!(matches!(error, TransitionError::RoleNotPermitted { role: Role::Cardholder, .. }));

        let error = validate_transition(
            RequestStatus::AoReview,
            RequestStatus::Approved,
            Role::Requester,
            &context(),
        )
        .expect_err("requester cannot approve");
        assert!(matches!(error, TransitionError::RoleNotPermitted { .. }));
    }

    #[test]
    fn admin_is_allowed_on_every_defined_edge() {
        for (from, to, _) in TABLE {
            validate_transition(from, to, Role::Admin, &context())
                .unwrap_or_else(|error| panic!("admin on {from:?} -> {to:?}: {error}"));
        }
    }

    #[test]
    fn approval_amount_equal_to_limit_passes() {
        let context = TransitionContext {
            amount: Decimal::new(300_000, 2),
            approval_limit: Decimal::new(300_000, 2),
            ..context()
        };

        let outcome = validate_transition(
            RequestStatus::AoReview,
            RequestStatus::Approved,
            Role::Approver,
            &context,
        )
        .expect("amount equal to the limit is not exceeded");
        assert_eq!(outcome.to, RequestStatus::Approved);
    }

    #[test]
    fn approval_amount_a_cent_over_limit_is_rejected() {
        let context = TransitionContext {
            amount: Decimal::new(300_001, 2),
            approval_limit: Decimal::new(300_000, 2),
            ..context()
        };

        let error = validate_transition(
            RequestStatus::AoReview,
            RequestStatus::Approved,
            Role::Approver,
            &context,
        )
        .expect_err("a cent over the limit must be rejected");
        assert!(matches!(error, TransitionError::ApprovalLimitExceeded { .. }));
        assert!(error.to_string().contains("exceeds approval limit"));
    }

    #[test]
    fn approval_limit_is_not_enforced_on_other_edges() {
        let context = TransitionContext {
            amount: Decimal::new(900_000, 2),
            approval_limit: Decimal::ZERO,
            ..context()
        };

        validate_transition(
            RequestStatus::Submitted,
            RequestStatus::AoReview,
            Role::Approver,
            &context,
        )
        .expect("limit only gates ao_review -> approved");
    }

    #[test]
    fn org_mismatch_is_rejected_for_non_admin_roles() {
        let context =
            TransitionContext { actor_org: OrgId("org-2".to_string()), ..context() };

        let error = validate_transition(
            RequestStatus::Draft,
            RequestStatus::Submitted,
            Role::Requester,
            &context,
        )
        .expect_err("cross-org transition must be rejected");
        assert!(matches!(error, TransitionError::OrgMismatch { .. }));
    }

    #[test]
    fn admin_bypasses_amount_and_org_checks() {
        let context = TransitionContext {
            amount: Decimal::new(1_000_000, 2),
            approval_limit: Decimal::ZERO,
            actor_org: OrgId("org-other".to_string()),
            request_org: OrgId("org-1".to_string()),
        };

        validate_transition(
            RequestStatus::AoReview,
            RequestStatus::Approved,
            Role::Admin,
            &context,
        )
        .expect("admin bypasses limit and org checks");
    }

    #[test]
    fn returned_requests_can_reenter_the_flow_both_ways() {
        validate_transition(
            RequestStatus::Returned,
            RequestStatus::Draft,
            Role::Requester,
            &context(),
        )
        .expect("returned -> draft");
        validate_transition(
            RequestStatus::Returned,
            RequestStatus::Submitted,
            Role::Requester,
            &context(),
        )
        .expect("returned -> submitted");
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        assert!(is_terminal(RequestStatus::Closed));
        assert!(is_terminal(RequestStatus::Denied));
        assert_eq!(initial_status(), RequestStatus::Draft);

        for to in ALL_STATUSES {
            assert!(!is_defined_edge(RequestStatus::Closed, to));
            assert!(!is_defined_edge(RequestStatus::Denied, to));
        }
    }

    #[test]
    fn validation_is_deterministic_for_identical_inputs() {
        let first = validate_transition(
            RequestStatus::AoReview,
            RequestStatus::Approved,
            Role::Approver,
            &context(),
        );
        let second = validate_transition(
            RequestStatus::AoReview,
            RequestStatus::Approved,
            Role::Approver,
            &context(),
        );

        assert_eq!(first, second);
    }
}

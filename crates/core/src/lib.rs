pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod policy;

pub use audit::AuditEvent;
pub use domain::request::{PurchaseRequest, RequestId, RequestStatus};
pub use domain::user::{OrgId, Role, User, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{
    initial_status, is_terminal, validate_transition, TransitionContext, TransitionError,
    TransitionOutcome,
};
pub use policy::{
    evaluate_policy_checks, has_blocking_finding, PolicyCheckKind, PolicyFinding, ProgramSettings,
    Severity,
};

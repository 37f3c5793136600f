use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::request::PurchaseRequest;

/// Snapshot of the purchase-card program settings singleton. Loaded by the
/// caller and passed in by reference so the evaluator stays pure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSettings {
    pub micro_purchase_limit: Decimal,
    pub blocked_merchants: Vec<String>,
    pub split_purchase_window_days: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyCheckKind {
    MicroPurchaseLimit,
    BlockedMerchant,
    SplitPurchase,
}

impl PolicyCheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MicroPurchaseLimit => "micro_purchase_limit",
            Self::BlockedMerchant => "blocked_merchant",
            Self::SplitPurchase => "split_purchase",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFinding {
    pub kind: PolicyCheckKind,
    pub severity: Severity,
    pub message: String,
    pub details: BTreeMap<String, String>,
}

impl PolicyFinding {
    fn new(kind: PolicyCheckKind, severity: Severity, message: impl Into<String>) -> Self {
        Self { kind, severity, message: message.into(), details: BTreeMap::new() }
    }

    fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Evaluates the fixed policy rule set against one request.
///
/// `recent` is the set of other requests considered for split-purchase
/// detection; passing it in keeps the function deterministic for identical
/// inputs. Findings come back in a fixed rule order. A missing settings
/// snapshot yields no findings: checks fail open, the transition itself does
/// not.
pub fn evaluate_policy_checks(
    request: &PurchaseRequest,
    settings: Option<&ProgramSettings>,
    recent: &[PurchaseRequest],
    now: DateTime<Utc>,
) -> Vec<PolicyFinding> {
    let Some(settings) = settings else {
        return Vec::new();
    };

    let mut findings = Vec::new();

    if request.total_estimate > settings.micro_purchase_limit {
        findings.push(
            PolicyFinding::new(
                PolicyCheckKind::MicroPurchaseLimit,
                Severity::Warning,
                format!(
                    "estimated total {} is above the micro-purchase limit {}",
                    request.total_estimate, settings.micro_purchase_limit
                ),
            )
            .with_detail("total_estimate", request.total_estimate.to_string())
            .with_detail("micro_purchase_limit", settings.micro_purchase_limit.to_string()),
        );
    }

    let vendor_key = normalize_merchant(&request.vendor);
    if settings.blocked_merchants.iter().any(|merchant| normalize_merchant(merchant) == vendor_key)
    {
        findings.push(
            PolicyFinding::new(
                PolicyCheckKind::BlockedMerchant,
                Severity::Error,
                format!("vendor `{}` is on the blocked merchant list", request.vendor),
            )
            .with_detail("vendor", request.vendor.clone()),
        );
    }

    if let Some(finding) = detect_split_purchase(request, settings, recent, now) {
        findings.push(finding);
    }

    findings
}

pub fn has_blocking_finding(findings: &[PolicyFinding]) -> bool {
    findings.iter().any(|finding| finding.severity == Severity::Error)
}

/// Sums the request plus peer requests from the same requester to the same
/// vendor inside the trailing window. A combined total above the
/// micro-purchase limit suggests one purchase split to dodge it.
fn detect_split_purchase(
    request: &PurchaseRequest,
    settings: &ProgramSettings,
    recent: &[PurchaseRequest],
    now: DateTime<Utc>,
) -> Option<PolicyFinding> {
    let window_start = now - Duration::days(i64::from(settings.split_purchase_window_days));
    let vendor_key = normalize_merchant(&request.vendor);

    let peers: Vec<&PurchaseRequest> = recent
        .iter()
        .filter(|peer| peer.id != request.id)
        .filter(|peer| peer.requester_id == request.requester_id)
        .filter(|peer| normalize_merchant(&peer.vendor) == vendor_key)
        .filter(|peer| peer.created_at >= window_start && peer.created_at <= now)
        .collect();

    if peers.is_empty() {
        return None;
    }

    let combined_total: Decimal =
        request.total_estimate + peers.iter().map(|peer| peer.total_estimate).sum::<Decimal>();

    if combined_total <= settings.micro_purchase_limit {
        return None;
    }

    Some(
        PolicyFinding::new(
            PolicyCheckKind::SplitPurchase,
            Severity::Warning,
            format!(
                "combined total {} to `{}` within {} days is above the micro-purchase limit {}",
                combined_total,
                request.vendor,
                settings.split_purchase_window_days,
                settings.micro_purchase_limit
            ),
        )
        .with_detail("combined_total", combined_total.to_string())
        .with_detail("window_days", settings.split_purchase_window_days.to_string())
        .with_detail("request_count", (peers.len() + 1).to_string()),
    )
}

fn normalize_merchant(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

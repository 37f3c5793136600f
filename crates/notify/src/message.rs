use crate::TransitionNotification;

/// Renders the plain-text webhook payload for one committed transition.
pub fn render_text(notification: &TransitionNotification) -> String {
    let mut text = format!(
        "Purchase request {} moved {} -> {} by {} (vendor: {}, estimate: {})",
        notification.request_id,
        notification.from.as_str(),
        notification.to.as_str(),
        notification.actor_uid,
        notification.vendor,
        notification.total_estimate,
    );

    if !notification.warnings.is_empty() {
        text.push_str("\nPolicy warnings:");
        for warning in &notification.warnings {
            text.push_str("\n- ");
            text.push_str(warning);
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use procflow_core::domain::request::RequestStatus;

    use crate::TransitionNotification;

    use super::render_text;

    fn notification(warnings: Vec<String>) -> TransitionNotification {
        TransitionNotification {
            request_id: "REQ-2026-0042".to_string(),
            from: RequestStatus::AoReview,
            to: RequestStatus::Approved,
            actor_uid: "u-approver".to_string(),
            vendor: "Office Depot".to_string(),
            total_estimate: Decimal::new(450_000, 2),
            warnings,
        }
    }

    #[test]
    fn renders_route_actor_and_amount() {
        let text = render_text(&notification(vec![]));

        assert!(text.contains("REQ-2026-0042"));
        assert!(text.contains("ao_review -> approved"));
        assert!(text.contains("u-approver"));
        assert!(text.contains("4500.00"));
        assert!(!text.contains("Policy warnings"));
    }

    #[test]
    fn lists_every_policy_warning() {
        let text = render_text(&notification(vec![
            "estimated total is above the micro-purchase limit".to_string(),
            "combined vendor total suggests a split purchase".to_string(),
        ]));

        assert!(text.contains("Policy warnings:"));
        assert_eq!(text.matches("\n- ").count(), 2);
    }
}

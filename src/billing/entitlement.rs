use serde::{Serialize, Serializer};

use super::models::SubscriptionRecord;

pub const FREE_LIMIT_REASON: &str = "Free plan limit reached";

/// key: entitlement -> per-request decision for metered actions
///
/// Computed fresh on every check, never persisted. The caller performs the
/// gated action only after seeing `allowed: true`; nothing here reserves a
/// quota slot, so two concurrent checks can both pass (soft limit).
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementDecision {
    pub allowed: bool,
    pub is_pro: bool,
    pub current_usage: i64,
    pub limit: UsageLimit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Serialized as the raw cap for free users and the string `"unlimited"`
/// for pro, matching what the front-end renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLimit {
    Limited(i64),
    Unlimited,
}

impl Serialize for UsageLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UsageLimit::Limited(n) => serializer.serialize_i64(*n),
            UsageLimit::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

/// Pure decision step: `usage` is the lifetime lesson count, `limit` the
/// free-tier cap. Pro status requires a record whose status is exactly
/// `active`; an absent record or any other status falls through to the
/// metered path.
pub fn decide(
    subscription: Option<&SubscriptionRecord>,
    usage: i64,
    limit: i64,
) -> EntitlementDecision {
    let is_pro = subscription.map(SubscriptionRecord::is_pro).unwrap_or(false);
    if is_pro {
        return EntitlementDecision {
            allowed: true,
            is_pro: true,
            current_usage: usage,
            limit: UsageLimit::Unlimited,
            reason: None,
        };
    }
    if usage >= limit {
        return EntitlementDecision {
            allowed: false,
            is_pro: false,
            current_usage: usage,
            limit: UsageLimit::Limited(limit),
            reason: Some(FREE_LIMIT_REASON.to_string()),
        };
    }
    EntitlementDecision {
        allowed: true,
        is_pro: false,
        current_usage: usage,
        limit: UsageLimit::Limited(limit),
        reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(status: &str) -> SubscriptionRecord {
        let now = Utc::now();
        SubscriptionRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            billing_customer_id: "cus_1".into(),
            billing_subscription_id: "sub_1".into(),
            status: status.into(),
            plan_name: "pro".into(),
            current_period_start: now,
            current_period_end: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn no_record_means_free_tier() {
        let decision = decide(None, 0, 1);
        assert!(!decision.is_pro);
        assert!(decision.allowed);
        assert_eq!(decision.limit, UsageLimit::Limited(1));
    }

    #[test]
    fn non_active_statuses_never_entitle() {
        // Includes statuses the provider may invent after this code ships.
        for status in ["canceled", "past_due", "incomplete", "hibernating"] {
            let rec = record(status);
            let decision = decide(Some(&rec), 0, 1);
            assert!(!decision.is_pro, "status {status:?} treated as pro");
        }
    }

    #[test]
    fn free_tier_boundary_is_exact() {
        let below = decide(None, 0, 1);
        assert!(below.allowed);
        assert_eq!(below.current_usage, 0);
        assert!(below.reason.is_none());

        let at_limit = decide(None, 1, 1);
        assert!(!at_limit.allowed);
        assert_eq!(at_limit.current_usage, 1);
        assert_eq!(at_limit.reason.as_deref(), Some(FREE_LIMIT_REASON));
    }

    #[test]
    fn pro_is_never_blocked_by_usage() {
        let rec = record("active");
        let decision = decide(Some(&rec), 10_000, 1);
        assert!(decision.allowed);
        assert!(decision.is_pro);
        assert_eq!(decision.limit, UsageLimit::Unlimited);
        assert!(decision.reason.is_none());
    }

    #[test]
    fn limit_serializes_as_number_or_unlimited() {
        let free = serde_json::to_value(decide(None, 0, 1)).unwrap();
        assert_eq!(free["limit"], serde_json::json!(1));
        let rec = record("active");
        let pro = serde_json::to_value(decide(Some(&rec), 3, 1)).unwrap();
        assert_eq!(pro["limit"], serde_json::json!("unlimited"));
    }
}

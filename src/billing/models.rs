use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// key: billing-models -> local mirror of one provider subscription object
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub billing_customer_id: String,
    pub billing_subscription_id: String,
    pub status: String,
    pub plan_name: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Strict equality against the provider's `active` literal. The status
    /// vocabulary is open-ended on the provider side, so anything this
    /// service has never seen stays non-pro.
    pub fn is_pro(&self) -> bool {
        self.status == "active"
    }
}

/// Subscription object as the provider ships it, both inside webhook
/// payloads and on direct API reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    #[serde(default)]
    pub plan: Option<ProviderPlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPlan {
    pub id: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl ProviderSubscription {
    pub fn plan_name(&self) -> String {
        self.plan
            .as_ref()
            .map(|plan| plan.nickname.clone().unwrap_or_else(|| plan.id.clone()))
            .unwrap_or_else(|| "pro".to_string())
    }

    pub fn period_start(&self) -> Result<DateTime<Utc>> {
        timestamp(self.current_period_start)
    }

    pub fn period_end(&self) -> Result<DateTime<Utc>> {
        timestamp(self.current_period_end)
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| anyhow!("provider timestamp {secs} out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_status(status: &str) -> SubscriptionRecord {
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
    fn only_the_active_literal_counts_as_pro() {
        assert!(record_with_status("active").is_pro());
        for status in ["canceled", "past_due", "incomplete", "Active", "paused_v2"] {
            assert!(!record_with_status(status).is_pro(), "status {status:?}");
        }
    }

    #[test]
    fn plan_name_prefers_nickname_then_price_id() {
        let mut subscription = ProviderSubscription {
            id: "sub_1".into(),
            customer: "cus_1".into(),
            status: "active".into(),
            current_period_start: 1_755_000_000,
            current_period_end: 1_757_600_000,
            plan: Some(ProviderPlan {
                id: "price_123".into(),
                nickname: Some("Pro Monthly".into()),
            }),
        };
        assert_eq!(subscription.plan_name(), "Pro Monthly");
        subscription.plan = Some(ProviderPlan {
            id: "price_123".into(),
            nickname: None,
        });
        assert_eq!(subscription.plan_name(), "price_123");
        subscription.plan = None;
        assert_eq!(subscription.plan_name(), "pro");
    }

    #[test]
    fn out_of_range_timestamp_is_an_error() {
        let subscription = ProviderSubscription {
            id: "sub_1".into(),
            customer: "cus_1".into(),
            status: "active".into(),
            current_period_start: i64::MAX,
            current_period_end: 1_757_600_000,
            plan: None,
        };
        assert!(subscription.period_start().is_err());
        assert!(subscription.period_end().is_ok());
    }
}

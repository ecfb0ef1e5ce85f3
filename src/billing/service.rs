use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config;

use super::entitlement::{decide, EntitlementDecision};
use super::models::{ProviderSubscription, SubscriptionRecord};

/// key: billing-service -> subscription reads/writes and entitlement checks
///
/// Sole writer of subscription rows. Everything else (handlers, the
/// entitlement path) only reads what the reconciler last wrote.
#[derive(Clone)]
pub struct BillingService {
    pool: PgPool,
}

impl BillingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Latest subscription row for a user, if any. Absence is not an error:
    /// it just means the free tier.
    pub async fn subscription_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionRecord>> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM subscriptions WHERE user_id = $1 ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn find_by_provider_id(
        &self,
        billing_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(
            "SELECT * FROM subscriptions WHERE billing_subscription_id = $1",
        )
        .bind(billing_subscription_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Upsert keyed by the provider's subscription id, overwriting the
    /// mutable fields with the event's values. Re-applying the same event is
    /// a no-op, and an `updated` arriving before its `created` still lands.
    pub async fn upsert_from_provider(
        &self,
        user_id: Uuid,
        subscription: &ProviderSubscription,
    ) -> Result<SubscriptionRecord> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(
            r#"
            INSERT INTO subscriptions (
                id,
                user_id,
                billing_customer_id,
                billing_subscription_id,
                status,
                plan_name,
                current_period_start,
                current_period_end
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (billing_subscription_id)
            DO UPDATE SET
                status = EXCLUDED.status,
                plan_name = EXCLUDED.plan_name,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&subscription.customer)
        .bind(&subscription.id)
        .bind(&subscription.status)
        .bind(subscription.plan_name())
        .bind(subscription.period_start()?)
        .bind(subscription.period_end()?)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    /// Close a subscription. The row is retained with status `canceled` so
    /// billing history stays queryable.
    pub async fn mark_canceled(
        &self,
        billing_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(
            r#"
            UPDATE subscriptions
            SET status = 'canceled', updated_at = NOW()
            WHERE billing_subscription_id = $1
            RETURNING *
            "#,
        )
        .bind(billing_subscription_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Lifetime lesson count. Soft-deleted rows still count: deleting a
    /// lesson does not hand back a free-tier slot.
    pub async fn lesson_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// key: entitlement -> per-user decision for metered actions
    ///
    /// Read-and-decide only; the caller performs the gated action. Read
    /// failures propagate instead of defaulting to a decision.
    pub async fn evaluate_entitlement(&self, user_id: Uuid) -> Result<EntitlementDecision> {
        let subscription = self.subscription_for_user(user_id).await?;
        let usage = self.lesson_count(user_id).await?;
        Ok(decide(subscription.as_ref(), usage, *config::FREE_PLAN_LIMIT))
    }

    pub async fn billing_customer_id(&self, user_id: Uuid) -> Result<Option<String>> {
        let customer: Option<Option<String>> =
            sqlx::query_scalar("SELECT billing_customer_id FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(customer.flatten())
    }

    pub async fn set_billing_customer_id(&self, user_id: Uuid, customer_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET billing_customer_id = $2 WHERE id = $1")
            .bind(user_id)
            .bind(customer_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

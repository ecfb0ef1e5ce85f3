use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::models::ProviderSubscription;
use super::provider::BillingProvider;
use super::service::BillingService;

/// key: billing-reconciliation -> applies provider webhook events
///
/// Provider delivery is at-least-once and unordered, so every path here is
/// an overwrite-style upsert: re-applying an event is a no-op and an
/// `updated` arriving before its `created` still produces a record. No
/// event-timestamp comparison is done, so a redelivered stale event can
/// regress the record until the next fresh one lands.
pub struct Reconciler {
    service: BillingService,
    provider: Arc<dyn BillingProvider>,
}

impl Reconciler {
    pub fn new(service: BillingService, provider: Arc<dyn BillingProvider>) -> Self {
        Self { service, provider }
    }

    /// Apply one authenticity-verified provider event. Storage and provider
    /// failures bubble up so the webhook layer answers non-2xx and the
    /// provider redelivers.
    pub async fn apply(&self, event_type: &str, object: &Value) -> Result<()> {
        match event_type {
            "customer.subscription.created" | "customer.subscription.updated" => {
                let subscription: ProviderSubscription =
                    serde_json::from_value(object.clone())
                        .context("malformed subscription payload")?;
                self.sync_subscription(&subscription).await
            }
            "customer.subscription.deleted" => {
                let subscription: ProviderSubscription =
                    serde_json::from_value(object.clone())
                        .context("malformed subscription payload")?;
                match self.service.mark_canceled(&subscription.id).await? {
                    Some(record) => info!(
                        subscription = %record.billing_subscription_id,
                        user = %record.user_id,
                        "subscription closed"
                    ),
                    None => debug!(
                        subscription = %subscription.id,
                        "delete event for a subscription this service never saw"
                    ),
                }
                Ok(())
            }
            "invoice.payment_succeeded" | "invoice.payment_failed" => {
                // The invoice carries no status of its own, only a pointer.
                // Re-read the subscription from the provider and apply it
                // through the same upsert path as an `updated` event.
                let Some(subscription_id) =
                    object.get("subscription").and_then(Value::as_str)
                else {
                    debug!(event = event_type, "invoice event without a subscription reference");
                    return Ok(());
                };
                let subscription = self.provider.fetch_subscription(subscription_id).await?;
                self.sync_subscription(&subscription).await
            }
            other => {
                debug!(event = other, "ignoring unhandled provider event");
                Ok(())
            }
        }
    }

    async fn sync_subscription(&self, subscription: &ProviderSubscription) -> Result<()> {
        let Some(user_id) = self
            .provider
            .customer_user_id(&subscription.customer)
            .await?
        else {
            // Likely a customer created outside the normal checkout flow.
            // Dropped rather than retried; the delivery is still acknowledged.
            warn!(
                customer = %subscription.customer,
                subscription = %subscription.id,
                "provider customer carries no local user id, dropping event"
            );
            return Ok(());
        };
        let record = self.service.upsert_from_provider(user_id, subscription).await?;
        info!(
            user = %record.user_id,
            subscription = %record.billing_subscription_id,
            status = %record.status,
            "subscription record reconciled"
        );
        Ok(())
    }
}

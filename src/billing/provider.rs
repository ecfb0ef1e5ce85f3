use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::config;

use super::models::ProviderSubscription;

/// key: billing-provider -> outbound surface of the payments provider
///
/// Injected into handlers and the reconciler as a trait object so tests can
/// substitute a fake. Checkout stamps the local user id into the customer's
/// metadata; `customer_user_id` reads it back when webhooks arrive.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Local user id stamped into the provider customer's metadata at
    /// checkout time, or `None` when the customer carries no usable link.
    async fn customer_user_id(&self, customer_id: &str) -> Result<Option<Uuid>>;
    async fn fetch_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription>;
    async fn create_customer(&self, email: &str, user_id: Uuid) -> Result<String>;
    /// Returns the hosted checkout URL for a subscription-mode session.
    async fn create_checkout_session(&self, customer_id: &str, price_id: &str) -> Result<String>;
    /// Returns the self-service billing portal URL.
    async fn create_portal_session(&self, customer_id: &str) -> Result<String>;
}

pub struct StripeProvider {
    base: String,
    secret_key: String,
    client: Client,
}

impl StripeProvider {
    pub fn from_env() -> Self {
        Self::new("https://api.stripe.com", config::STRIPE_SECRET_KEY.clone())
    }

    pub fn new(base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("client build"),
        }
    }

    async fn get(&self, path: &str) -> Result<Value, reqwest::Error> {
        let url = format!("{}/v1/{}", self.base, path);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .error_for_status()?;
        resp.json().await
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<Value, reqwest::Error> {
        let url = format!("{}/v1/{}", self.base, path);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?
            .error_for_status()?;
        resp.json().await
    }
}

#[async_trait]
impl BillingProvider for StripeProvider {
    async fn customer_user_id(&self, customer_id: &str) -> Result<Option<Uuid>> {
        let customer = self
            .get(&format!("customers/{customer_id}"))
            .await
            .context("customer lookup failed")?;
        let linked = customer["metadata"]["user_id"]
            .as_str()
            .and_then(|raw| Uuid::parse_str(raw).ok());
        Ok(linked)
    }

    async fn fetch_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription> {
        let payload = self
            .get(&format!("subscriptions/{subscription_id}"))
            .await
            .context("subscription lookup failed")?;
        let subscription = serde_json::from_value(payload)
            .context("provider returned a malformed subscription object")?;
        Ok(subscription)
    }

    async fn create_customer(&self, email: &str, user_id: Uuid) -> Result<String> {
        let payload = self
            .post_form(
                "customers",
                &[
                    ("email", email.to_string()),
                    ("metadata[user_id]", user_id.to_string()),
                ],
            )
            .await
            .context("customer creation failed")?;
        payload["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("customer response missing id"))
    }

    async fn create_checkout_session(&self, customer_id: &str, price_id: &str) -> Result<String> {
        let app_base = config::APP_BASE_URL.as_str();
        let payload = self
            .post_form(
                "checkout/sessions",
                &[
                    ("customer", customer_id.to_string()),
                    ("mode", "subscription".to_string()),
                    ("payment_method_types[0]", "card".to_string()),
                    ("line_items[0][price]", price_id.to_string()),
                    ("line_items[0][quantity]", "1".to_string()),
                    ("success_url", format!("{app_base}/account?success=true")),
                    ("cancel_url", format!("{app_base}/pricing?canceled=true")),
                ],
            )
            .await
            .context("checkout session creation failed")?;
        payload["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("checkout session response missing url"))
    }

    async fn create_portal_session(&self, customer_id: &str) -> Result<String> {
        let app_base = config::APP_BASE_URL.as_str();
        let payload = self
            .post_form(
                "billing_portal/sessions",
                &[
                    ("customer", customer_id.to_string()),
                    ("return_url", format!("{app_base}/account")),
                ],
            )
            .await
            .context("portal session creation failed")?;
        payload["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("portal session response missing url"))
    }
}

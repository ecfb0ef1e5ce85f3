use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::error;

use crate::config;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

use super::entitlement::{EntitlementDecision, UsageLimit};
use super::models::SubscriptionRecord;
use super::provider::BillingProvider;
use super::service::BillingService;

/// key: billing-api -> entitlement, subscription details, checkout, portal

pub async fn entitlement(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id }: AuthUser,
) -> AppResult<Json<EntitlementDecision>> {
    let service = BillingService::new(pool);
    let decision = service.evaluate_entitlement(user_id).await.map_err(|e| {
        error!(?e, %user_id, "entitlement evaluation failed");
        AppError::Message("Billing service error".into())
    })?;
    Ok(Json(decision))
}

pub async fn subscription_details(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id }: AuthUser,
) -> AppResult<Json<SubscriptionDetails>> {
    let service = BillingService::new(pool);
    let subscription = service.subscription_for_user(user_id).await.map_err(|e| {
        error!(?e, %user_id, "DB error fetching subscription");
        AppError::Message("Billing service error".into())
    })?;
    let decision = service.evaluate_entitlement(user_id).await.map_err(|e| {
        error!(?e, %user_id, "entitlement evaluation failed");
        AppError::Message("Billing service error".into())
    })?;
    let remaining = match decision.limit {
        UsageLimit::Unlimited => UsageLimit::Unlimited,
        UsageLimit::Limited(limit) => {
            UsageLimit::Limited((limit - decision.current_usage).max(0))
        }
    };
    Ok(Json(SubscriptionDetails {
        subscription,
        is_pro: decision.is_pro,
        usage: UsageSummary {
            count: decision.current_usage,
            limit: decision.limit,
            remaining,
        },
    }))
}

pub async fn create_checkout(
    Extension(pool): Extension<PgPool>,
    Extension(provider): Extension<Arc<dyn BillingProvider>>,
    AuthUser { user_id }: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<SessionResponse>> {
    let price_id = payload
        .price_id
        .or_else(|| config::STRIPE_PRO_PRICE_ID.clone())
        .ok_or_else(|| AppError::BadRequest("Price ID is required".into()))?;

    let row = sqlx::query("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            error!(?e, "DB error fetching user for checkout");
            AppError::Db(e)
        })?;
    let Some(row) = row else {
        return Err(AppError::NotFound);
    };
    let email: String = row.get("email");

    let service = BillingService::new(pool);
    let customer_id = match service.billing_customer_id(user_id).await.map_err(|e| {
        error!(?e, %user_id, "DB error fetching billing customer id");
        AppError::Message("Billing service error".into())
    })? {
        Some(id) => id,
        None => {
            let id = provider.create_customer(&email, user_id).await.map_err(|e| {
                error!(?e, %user_id, "provider customer creation failed");
                AppError::BadGateway("Failed to create billing customer".into())
            })?;
            service
                .set_billing_customer_id(user_id, &id)
                .await
                .map_err(|e| {
                    error!(?e, %user_id, "DB error persisting billing customer id");
                    AppError::Message("Billing service error".into())
                })?;
            id
        }
    };

    let url = provider
        .create_checkout_session(&customer_id, &price_id)
        .await
        .map_err(|e| {
            error!(?e, %user_id, "checkout session creation failed");
            AppError::BadGateway("Failed to create checkout session".into())
        })?;
    Ok(Json(SessionResponse { url }))
}

pub async fn billing_portal(
    Extension(pool): Extension<PgPool>,
    Extension(provider): Extension<Arc<dyn BillingProvider>>,
    AuthUser { user_id }: AuthUser,
) -> AppResult<Json<SessionResponse>> {
    let service = BillingService::new(pool);
    let customer_id = service
        .billing_customer_id(user_id)
        .await
        .map_err(|e| {
            error!(?e, %user_id, "DB error fetching billing customer id");
            AppError::Message("Billing service error".into())
        })?
        .ok_or_else(|| AppError::NotFound)?;

    let url = provider
        .create_portal_session(&customer_id)
        .await
        .map_err(|e| {
            error!(?e, %user_id, "portal session creation failed");
            AppError::BadGateway("Failed to create billing portal session".into())
        })?;
    Ok(Json(SessionResponse { url }))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub price_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionDetails {
    pub subscription: Option<SubscriptionRecord>,
    pub is_pro: bool,
    pub usage: UsageSummary,
}

#[derive(Debug, Serialize)]
pub struct UsageSummary {
    pub count: i64,
    pub limit: UsageLimit,
    pub remaining: UsageLimit,
}

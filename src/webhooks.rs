use axum::{body::Bytes, extract::Extension, http::HeaderMap, Json};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::billing::{BillingProvider, BillingService, Reconciler};
use crate::config;
use crate::error::{AppError, AppResult};

/// key: webhooks-billing -> verified provider event intake
#[derive(Debug, Deserialize)]
pub struct ProviderEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub object: Value,
}

/// Authenticity is checked here, against the raw body, before anything is
/// parsed or handed to the reconciler. A reconciliation failure maps to a
/// non-2xx response so the provider's retry machinery redelivers the event.
pub async fn stripe_webhook(
    Extension(pool): Extension<PgPool>,
    Extension(provider): Extension<Arc<dyn BillingProvider>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::BadRequest("Missing signature".into()))?;
    verify_signature(config::STRIPE_WEBHOOK_SECRET.as_str(), signature, &body)?;

    let event: ProviderEvent = serde_json::from_slice(&body).map_err(|e| {
        error!(?e, "malformed webhook payload");
        AppError::BadRequest("Malformed event payload".into())
    })?;

    let reconciler = Reconciler::new(BillingService::new(pool), provider);
    reconciler
        .apply(&event.event_type, &event.data.object)
        .await
        .map_err(|e| {
            error!(?e, event = %event.event_type, "webhook reconciliation failed");
            AppError::Message("Webhook handler error".into())
        })?;

    Ok(Json(serde_json::json!({ "received": true })))
}

/// Verify the provider's `t=<ts>,v1=<hex>` signature scheme: HMAC-SHA256
/// over `"{t}.{raw body}"` with the endpoint secret.
pub fn verify_signature(secret: &str, header: &str, body: &[u8]) -> Result<(), AppError> {
    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(AppError::BadRequest("Bad signature".into()))?;
    if candidates.is_empty() {
        return Err(AppError::BadRequest("Bad signature".into()));
    }

    let expected = {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can use any key length");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    };
    if candidates.iter().any(|candidate| *candidate == expected) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can use any key length");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_is_accepted() {
        let body = br#"{"type":"customer.subscription.updated"}"#;
        let header = format!("t=1712000000,v1={}", sign("whsec_test", "1712000000", body));
        assert!(verify_signature("whsec_test", &header, body).is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let body = br#"{"type":"customer.subscription.updated"}"#;
        let header = format!("t=1712000000,v1={}", sign("whsec_test", "1712000000", body));
        let other = br#"{"type":"customer.subscription.deleted"}"#;
        assert!(matches!(
            verify_signature("whsec_test", &header, other),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = b"{}";
        let header = format!("t=1712000000,v1={}", sign("whsec_other", "1712000000", body));
        assert!(matches!(
            verify_signature("whsec_test", &header, body),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn header_without_timestamp_is_rejected() {
        let body = b"{}";
        let header = format!("v1={}", sign("whsec_test", "1712000000", body));
        assert!(matches!(
            verify_signature("whsec_test", &header, body),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn extra_signature_candidates_are_tolerated() {
        let body = b"{}";
        let good = sign("whsec_test", "1712000000", body);
        let header = format!("t=1712000000,v1=deadbeef,v1={good},v0=ignored");
        assert!(verify_signature("whsec_test", &header, body).is_ok());
    }
}

use httpmock::prelude::*;
use lessonforge::billing::{BillingProvider, StripeProvider};
use serde_json::json;
use uuid::Uuid;

// key: billing-provider-tests -> HTTP surface of the payments client

#[tokio::test]
async fn customer_metadata_resolves_the_local_user() {
    let server = MockServer::start_async().await;
    let user_id = Uuid::new_v4();
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/customers/cus_123")
                .header("authorization", "Bearer sk_test_key");
            then.status(200).json_body(json!({
                "id": "cus_123",
                "metadata": { "user_id": user_id.to_string() }
            }));
        })
        .await;

    let provider = StripeProvider::new(server.base_url(), "sk_test_key");
    let resolved = provider.customer_user_id("cus_123").await.unwrap();
    assert_eq!(resolved, Some(user_id));
    mock.assert_async().await;
}

#[tokio::test]
async fn customer_without_linked_user_resolves_to_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/customers/cus_stray");
            then.status(200).json_body(json!({
                "id": "cus_stray",
                "metadata": {}
            }));
        })
        .await;

    let provider = StripeProvider::new(server.base_url(), "sk_test_key");
    let resolved = provider.customer_user_id("cus_stray").await.unwrap();
    assert_eq!(resolved, None);
}

#[tokio::test]
async fn malformed_metadata_user_id_resolves_to_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/customers/cus_bad");
            then.status(200).json_body(json!({
                "id": "cus_bad",
                "metadata": { "user_id": "not-a-uuid" }
            }));
        })
        .await;

    let provider = StripeProvider::new(server.base_url(), "sk_test_key");
    let resolved = provider.customer_user_id("cus_bad").await.unwrap();
    assert_eq!(resolved, None);
}

#[tokio::test]
async fn subscription_fetch_parses_the_provider_payload() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/subscriptions/sub_123");
            then.status(200).json_body(json!({
                "id": "sub_123",
                "customer": "cus_123",
                "status": "past_due",
                "current_period_start": 1_754_000_000i64,
                "current_period_end": 1_756_600_000i64,
                "plan": { "id": "price_pro", "nickname": "Pro Monthly" }
            }));
        })
        .await;

    let provider = StripeProvider::new(server.base_url(), "sk_test_key");
    let subscription = provider.fetch_subscription("sub_123").await.unwrap();
    assert_eq!(subscription.status, "past_due");
    assert_eq!(subscription.customer, "cus_123");
    assert_eq!(subscription.plan_name(), "Pro Monthly");
}

#[tokio::test]
async fn provider_error_statuses_surface_as_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/subscriptions/sub_missing");
            then.status(404).json_body(json!({
                "error": { "message": "No such subscription" }
            }));
        })
        .await;

    let provider = StripeProvider::new(server.base_url(), "sk_test_key");
    assert!(provider.fetch_subscription("sub_missing").await.is_err());
}

#[tokio::test]
async fn customer_creation_stamps_the_local_user_id() {
    let server = MockServer::start_async().await;
    let user_id = Uuid::new_v4();
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/customers")
                .body_contains("teacher%40example.com")
                .body_contains(user_id.to_string());
            then.status(200).json_body(json!({ "id": "cus_new" }));
        })
        .await;

    let provider = StripeProvider::new(server.base_url(), "sk_test_key");
    let customer_id = provider
        .create_customer("teacher@example.com", user_id)
        .await
        .unwrap();
    assert_eq!(customer_id, "cus_new");
    mock.assert_async().await;
}

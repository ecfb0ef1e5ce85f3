use axum::{
    routing::{get, post},
    Router,
};

use crate::{auth, billing, lessons, webhooks};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/register", post(auth::register_user))
        .route("/api/login", post(auth::login_user))
        .route("/api/logout", post(auth::logout_user))
        .route("/api/me", get(auth::current_user))
        .route(
            "/api/lessons",
            get(lessons::list_lessons).post(lessons::create_lesson),
        )
        .route(
            "/api/lessons/:id",
            get(lessons::get_lesson)
                .patch(lessons::update_lesson)
                .delete(lessons::delete_lesson),
        )
        .route("/api/entitlement", get(billing::api::entitlement))
        .route(
            "/api/billing/subscription",
            get(billing::api::subscription_details),
        )
        .route("/api/billing/checkout", post(billing::api::create_checkout))
        .route("/api/billing/portal", post(billing::api::billing_portal))
        .route("/api/webhooks/stripe", post(webhooks::stripe_webhook))
}

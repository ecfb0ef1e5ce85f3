use once_cell::sync::Lazy;

/// Secret used for JWT signing. Must be set via the `JWT_SECRET` env variable.
pub static JWT_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"));

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running even if database
/// migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

/// key: entitlement-config -> lifetime lesson cap for the free tier
pub static FREE_PLAN_LIMIT: Lazy<i64> = Lazy::new(|| {
    std::env::var("FREE_PLAN_LIMIT")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value >= 0)
        .unwrap_or(1)
});

/// Public base URL of the front-end, used for checkout redirect targets.
pub static APP_BASE_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("APP_BASE_URL")
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "http://localhost:3000".to_string())
});

/// key: billing-config -> payments provider API key
pub static STRIPE_SECRET_KEY: Lazy<String> =
    Lazy::new(|| std::env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY must be set"));

/// key: billing-config -> webhook endpoint signing secret
pub static STRIPE_WEBHOOK_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET must be set"));

/// key: billing-config -> default price for the pro tier checkout
pub static STRIPE_PRO_PRICE_ID: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("STRIPE_PRO_PRICE_ID"));

/// API key for the lesson-plan model provider.
pub static ANTHROPIC_API_KEY: Lazy<String> =
    Lazy::new(|| std::env::var("ANTHROPIC_API_KEY").expect("ANTHROPIC_API_KEY must be set"));

/// Model used for lesson generation.
pub static ANTHROPIC_MODEL: Lazy<String> = Lazy::new(|| {
    std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string())
});

/// Base URL of the model provider API. Overridable for local stubs.
pub static ANTHROPIC_BASE_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("ANTHROPIC_BASE_URL")
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "https://api.anthropic.com".to_string())
});

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

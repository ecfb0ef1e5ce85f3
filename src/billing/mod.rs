pub mod api;
pub mod entitlement;
pub mod models;
pub mod provider;
pub mod reconciliation;
pub mod service;

pub use entitlement::{EntitlementDecision, UsageLimit, FREE_LIMIT_REASON};
pub use models::{ProviderPlan, ProviderSubscription, SubscriptionRecord};
pub use provider::{BillingProvider, StripeProvider};
pub use reconciliation::Reconciler;
pub use service::BillingService;

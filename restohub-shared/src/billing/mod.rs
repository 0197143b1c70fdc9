/// Payment processor integration
///
/// Subscriptions are sold through hosted checkout pages. The processor is
/// reached through the [`PaymentGateway`] trait; [`stripe::StripeGateway`]
/// is the production implementation. Payment outcomes come back as signed
/// webhook calls, handled by [`webhook`].
///
/// # Flow
///
/// ```text
/// POST /subscription/stripe/checkout
///   ├─> gateway.create_checkout_session()   (subscription stored as pending)
///   └─> client is redirected to checkout_url
/// processor ── POST /subscription/webhook ──> verify signature
///   ├─> checkout.session.completed          (activate)
///   ├─> payment_intent.succeeded            (activate)
///   └─> payment_intent.payment_failed       (expire)
/// ```

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::subscription::Plan;

pub mod stripe;
pub mod webhook;

/// Error type for payment processor calls
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No API key configured
    #[error("Payment processor is not configured")]
    NotConfigured,

    /// The processor answered with an error
    #[error("Payment processor error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The processor could not be reached or answered garbage
    #[error("Payment processor request failed: {0}")]
    Transport(String),
}

/// Product and price registered for a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSetup {
    pub plan: Plan,
    pub product_id: String,
    pub price_id: String,
}

/// Parameters for a hosted checkout page
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub email: String,
    pub plan: Plan,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A created checkout page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Operations against the payment processor
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a product and a one-off USD price for a paid plan
    async fn create_plan(&self, plan: Plan) -> Result<PlanSetup, GatewayError>;

    /// Opens a checkout session for one unit of `request.price_id`
    ///
    /// The session carries the user ID as `client_reference_id` and in the
    /// metadata of both the session and its payment intent, so every
    /// resulting webhook can be traced back to the user.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;
}

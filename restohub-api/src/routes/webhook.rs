/// Payment processor webhook
///
/// `POST /api/auth/subscription/webhook/`
///
/// Unauthenticated; trust comes from the `Stripe-Signature` header. The body
/// is read raw because the signature covers the exact bytes sent.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use restohub_shared::{
    billing::webhook::{parse_event, verify_signature, WebhookEvent},
    models::subscription::{Subscription, SubscriptionStatus},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// `{success, message}` acknowledgement; any 2xx stops processor retries
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let secret = state.config.stripe.webhook_secret.as_deref().ok_or_else(|| {
        ApiError::InternalError("STRIPE_WEBHOOK_SECRET is not configured".to_string())
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = verify_signature(&body, signature, secret, Utc::now()) {
        tracing::warn!(error = %e, "Rejected webhook delivery");
        return Err(e.into());
    }

    let event = parse_event(&body)?;
    tracing::debug!(event = ?event, "Webhook event received");

    let message = match event {
        WebhookEvent::CheckoutCompleted {
            session_id,
            user_id,
            plan,
            payment_intent,
        } => {
            let Some(user_id) = user_id else {
                tracing::warn!(session_id = %session_id, "Checkout completed without a user reference");
                return Ok(ack("Checkout session completed"));
            };

            let updated = Subscription::complete_checkout(
                &state.db,
                user_id,
                plan,
                &session_id,
                payment_intent.as_deref(),
            )
            .await?;

            match updated {
                Some(subscription) => tracing::info!(
                    user_id = %user_id,
                    plan = %subscription.plan,
                    session_id = %session_id,
                    "Subscription activated after checkout"
                ),
                None => tracing::warn!(
                    user_id = %user_id,
                    session_id = %session_id,
                    "Checkout completed for a user without a subscription"
                ),
            }
            "Checkout session completed".to_string()
        }
        WebhookEvent::PaymentSucceeded { user_id } => {
            update_status(&state, user_id, SubscriptionStatus::Active).await?;
            "Payment succeeded".to_string()
        }
        WebhookEvent::PaymentFailed { user_id } => {
            update_status(&state, user_id, SubscriptionStatus::Expired).await?;
            "Payment failed event handled".to_string()
        }
        WebhookEvent::Other(event_type) => {
            tracing::debug!(event_type = %event_type, "Ignoring webhook event");
            format!("Event type {} received but not handled", event_type)
        }
    };

    Ok(ack(message))
}

fn ack(message: impl Into<String>) -> Json<WebhookAck> {
    Json(WebhookAck {
        success: true,
        message: message.into(),
    })
}

async fn update_status(
    state: &AppState,
    user_id: Option<Uuid>,
    status: SubscriptionStatus,
) -> ApiResult<()> {
    let Some(user_id) = user_id else {
        tracing::warn!(status = status.as_str(), "Payment event without a user reference");
        return Ok(());
    };

    match Subscription::set_status(&state.db, user_id, status).await? {
        Some(_) => tracing::info!(user_id = %user_id, status = status.as_str(), "Subscription status updated"),
        None => tracing::warn!(user_id = %user_id, "Payment event for a user without a subscription"),
    }

    Ok(())
}

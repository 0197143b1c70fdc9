/// Subscription endpoints
///
/// - `GET /api/auth/subscription/` - The caller's subscription, as a list of zero or one
/// - `GET /api/auth/subscription/:id/` - One subscription
/// - `POST /api/auth/subscription/cancel/` - Cancel the active or pending subscription
/// - `POST /api/auth/subscription/stripe/setup/` - Register paid plans with the processor (admin)
/// - `POST /api/auth/subscription/stripe/checkout/` - Start a subscription
/// - `GET /api/auth/subscription/payment/success/` - Browser return after payment
/// - `GET /api/auth/subscription/payment/cancel/` - Browser return after abandoning payment
///
/// The free plan activates immediately. Paid plans go through a hosted
/// checkout page and stay `pending` until the processor's webhook arrives.

use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use restohub_shared::{
    auth::middleware::{require_admin, AuthContext},
    billing::CheckoutRequest,
    models::subscription::{Plan, PlanPrice, Subscription},
};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::{DataResponse, ListResponse};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{JsonBody, PathParam, QueryParams},
};

/// A subscription as returned to clients
#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub plan_name: Option<&'static str>,
    pub is_active: bool,
}

impl From<Subscription> for SubscriptionView {
    fn from(subscription: Subscription) -> Self {
        Self {
            plan_name: subscription.get_plan().map(|p| p.display_name()),
            is_active: subscription.is_active(),
            subscription,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub plan: Option<String>,
}

/// Response for a plan that needs payment
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub message: String,
    pub checkout_url: String,
    pub session_id: String,
}

/// Response for the free plan
#[derive(Debug, Serialize)]
pub struct ActivatedResponse {
    pub success: bool,
    pub message: String,
    pub subscription_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub success: bool,
    pub message: String,
    pub price_ids: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentReturn {
    pub session_id: Option<String>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Subscription not found".to_string())
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ListResponse<SubscriptionView>>> {
    let subscription = Subscription::find_by_user(&state.db, auth.user_id).await?;

    Ok(Json(ListResponse::new(
        subscription.into_iter().map(SubscriptionView::from).collect(),
    )))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Json<DataResponse<SubscriptionView>>> {
    let subscription = Subscription::find_for_user(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(DataResponse::new(
        "Subscription retrieved successfully",
        subscription.into(),
    )))
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DataResponse<SubscriptionView>>> {
    let subscription = Subscription::cancel(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active subscription to cancel".to_string()))?;

    tracing::info!(
        user_id = %auth.user_id,
        plan = %subscription.plan,
        "Subscription cancelled"
    );

    Ok(Json(DataResponse::new(
        "Subscription cancelled successfully",
        subscription.into(),
    )))
}

/// Creates a product and price for every paid plan and records the price IDs
///
/// Running it again registers fresh prices; later checkouts use the newest.
pub async fn setup_plans(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<SetupResponse>> {
    require_admin(&auth)?;

    let mut price_ids = BTreeMap::new();
    for plan in Plan::paid_plans() {
        let setup = state.payments.create_plan(plan).await?;
        PlanPrice::upsert(&state.db, plan, &setup.product_id, &setup.price_id).await?;

        tracing::info!(
            plan = plan.as_str(),
            product_id = %setup.product_id,
            price_id = %setup.price_id,
            "Plan registered with payment processor"
        );
        price_ids.insert(plan.as_str().to_string(), setup.price_id);
    }

    Ok(Json(SetupResponse {
        success: true,
        message: "Stripe products and prices created successfully".to_string(),
        price_ids,
    }))
}

pub async fn checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(body): JsonBody<CheckoutBody>,
) -> ApiResult<Response> {
    let plan_name = body
        .plan
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::field("Plan is required", "plan", "This field is required"))?;
    let plan = Plan::from_str(&plan_name).ok_or_else(|| {
        ApiError::field(
            "Invalid plan",
            "plan",
            format!("\"{}\" is not a valid choice.", plan_name),
        )
    })?;

    if let Some(current) = Subscription::find_by_user(&state.db, auth.user_id).await? {
        if current.is_active() {
            return Err(ApiError::bad_request(
                "You already have an active subscription",
            ));
        }
    }

    if !plan.is_paid() {
        let subscription = Subscription::activate_now(&state.db, auth.user_id, plan).await?;
        tracing::info!(user_id = %auth.user_id, plan = plan.as_str(), "Trial activated");

        let response = ActivatedResponse {
            success: true,
            message: format!("{} plan activated successfully", plan.display_name()),
            subscription_id: subscription.id,
        };
        return Ok((StatusCode::CREATED, Json(response)).into_response());
    }

    let price = PlanPrice::find(&state.db, plan).await?.ok_or_else(|| {
        ApiError::ServiceUnavailable(
            "Payment plans are not set up yet. Run the Stripe setup first.".to_string(),
        )
    })?;

    let session = state
        .payments
        .create_checkout_session(&CheckoutRequest {
            user_id: auth.user_id,
            email: auth.email.clone(),
            plan,
            price_id: price.stripe_price_id.clone(),
            success_url: state.config.payment_success_url(),
            cancel_url: state.config.payment_cancel_url(),
        })
        .await?;

    Subscription::upsert_pending(
        &state.db,
        auth.user_id,
        plan,
        &price.stripe_price_id,
        &session.id,
    )
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        plan = plan.as_str(),
        session_id = %session.id,
        "Checkout session created"
    );

    let response = CheckoutResponse {
        success: true,
        message: "Checkout session created successfully".to_string(),
        checkout_url: session.url,
        session_id: session.id,
    };
    Ok(Json(response).into_response())
}

/// Where the browser lands after a successful payment
///
/// The session id is query-encoded, so it can never add parameters or
/// break the header.
fn success_location(frontend_url: &str, session_id: Option<&str>) -> String {
    let base = format!("{}/payment/success", frontend_url.trim_end_matches('/'));

    let Some(session_id) = session_id.filter(|s| !s.is_empty()) else {
        return base;
    };

    match Url::parse(&base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("session_id", session_id);
            url.into()
        }
        Err(_) => base,
    }
}

/// 303 to `location`, built without panicking on bad input
fn see_other(location: &str) -> ApiResult<Response> {
    let value = HeaderValue::try_from(location).map_err(|_| {
        ApiError::InternalError(format!("Redirect target is not a valid header: {}", location))
    })?;

    Ok((StatusCode::SEE_OTHER, [(header::LOCATION, value)]).into_response())
}

pub async fn payment_success(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PaymentReturn>,
) -> ApiResult<Response> {
    see_other(&success_location(
        &state.config.api.frontend_url,
        query.session_id.as_deref(),
    ))
}

pub async fn payment_cancel(State(state): State<AppState>) -> ApiResult<Response> {
    see_other(&state.config.payment_cancel_url())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_location_keeps_plain_session_id() {
        assert_eq!(
            success_location("http://localhost:3000/", Some("cs_test_a1B2")),
            "http://localhost:3000/payment/success?session_id=cs_test_a1B2"
        );
        assert_eq!(
            success_location("http://localhost:3000", None),
            "http://localhost:3000/payment/success"
        );
        assert_eq!(
            success_location("http://localhost:3000", Some("")),
            "http://localhost:3000/payment/success"
        );
    }

    #[test]
    fn test_success_location_encodes_session_id() {
        let location = success_location(
            "http://localhost:3000",
            Some("cs&next=https://evil.example"),
        );
        assert_eq!(
            location,
            "http://localhost:3000/payment/success?session_id=cs%26next%3Dhttps%3A%2F%2Fevil.example"
        );

        let location = success_location("http://localhost:3000", Some("cs\nevil"));
        assert!(!location.contains('\n'));
        assert!(HeaderValue::try_from(location.as_str()).is_ok());
    }

    #[test]
    fn test_see_other_rejects_invalid_header() {
        let response = see_other("http://localhost:3000/payment/cancel").unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "http://localhost:3000/payment/cancel"
        );

        assert!(see_other("http://localhost:3000/\nevil").is_err());
    }
}

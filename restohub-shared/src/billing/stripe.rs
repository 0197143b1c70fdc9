/// Stripe implementation of [`PaymentGateway`]
///
/// Talks to the Stripe REST API directly with form-encoded requests.

use async_trait::async_trait;
use serde::Deserialize;

use super::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, PlanSetup};
use crate::models::subscription::Plan;

/// Default API base URL
pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.filter(|k| !k.is_empty()),
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, GatewayError> {
        let key = self.secret_key.as_deref().ok_or(GatewayError::NotConfigured)?;

        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(key)
            .form(form)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }
}

fn pair(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

/// Form fields for a checkout session
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let user_id = request.user_id.to_string();
    vec![
        pair("mode", "payment"),
        pair("line_items[0][price]", request.price_id.as_str()),
        pair("line_items[0][quantity]", "1"),
        pair("success_url", request.success_url.as_str()),
        pair("cancel_url", request.cancel_url.as_str()),
        pair("client_reference_id", user_id.as_str()),
        pair("customer_email", request.email.as_str()),
        pair("metadata[plan]", request.plan.as_str()),
        pair("metadata[user_id]", user_id.as_str()),
        pair("payment_intent_data[metadata][plan]", request.plan.as_str()),
        pair("payment_intent_data[metadata][user_id]", user_id),
    ]
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_plan(&self, plan: Plan) -> Result<PlanSetup, GatewayError> {
        let product: IdResponse = self
            .post(
                "/v1/products",
                &[
                    pair("name", plan.display_name()),
                    pair("metadata[plan]", plan.as_str()),
                ],
            )
            .await?;

        let price: IdResponse = self
            .post(
                "/v1/prices",
                &[
                    pair("product", product.id.as_str()),
                    pair("unit_amount", plan.price_cents().to_string()),
                    pair("currency", "usd"),
                    pair("metadata[plan]", plan.as_str()),
                ],
            )
            .await?;

        tracing::info!(plan = plan.as_str(), product_id = %product.id, price_id = %price.id, "Registered plan with Stripe");

        Ok(PlanSetup {
            plan,
            product_id: product.id,
            price_id: price.id,
        })
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let session: SessionResponse = self
            .post("/v1/checkout/sessions", &checkout_form(request))
            .await?;

        let url = session.url.ok_or_else(|| {
            GatewayError::Transport("checkout session has no url".to_string())
        })?;

        Ok(CheckoutSession { id: session.id, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_checkout_form_carries_user_everywhere() {
        let user_id = Uuid::new_v4();
        let request = CheckoutRequest {
            user_id,
            email: "owner@bistro.com".to_string(),
            plan: Plan::Enterprise,
            price_id: "price_123".to_string(),
            success_url: "http://localhost/success".to_string(),
            cancel_url: "http://localhost/cancel".to_string(),
        };

        let form = checkout_form(&request);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(get("client_reference_id"), Some(user_id.to_string()));
        assert_eq!(get("metadata[user_id]"), Some(user_id.to_string()));
        assert_eq!(get("payment_intent_data[metadata][user_id]"), Some(user_id.to_string()));
        assert_eq!(get("metadata[plan]").as_deref(), Some("enterprise"));
        assert_eq!(get("line_items[0][price]").as_deref(), Some("price_123"));
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_fails_fast() {
        let gateway = StripeGateway::new(Some(String::new()), STRIPE_API_BASE);
        let result = gateway.create_plan(Plan::Professional).await;
        assert!(matches!(result, Err(GatewayError::NotConfigured)));
    }
}

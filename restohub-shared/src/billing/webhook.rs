/// Webhook signature verification and event decoding
///
/// The processor signs each delivery with a `Stripe-Signature` header of
/// the form `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The signature is
/// HMAC-SHA256 over `"{t}.{raw body}"` keyed with the endpoint secret.
/// Deliveries older than [`SIGNATURE_TOLERANCE_SECS`] are rejected.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sha2::Sha256;
use uuid::Uuid;

use crate::models::subscription::Plan;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed delivery
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Error type for webhook handling
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Missing signature header")]
    MissingSignature,

    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Timestamp outside the tolerance zone")]
    Expired,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Computes the hex signature for a payload
pub fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
    let mac = signed_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a delivery's signature header against its raw body
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<(), WebhookError> {
    let header = header.ok_or(WebhookError::MissingSignature)?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| WebhookError::MalformedHeader)?);
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    let valid = signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        signed_mac(secret, timestamp, payload)
            .map(|mac| mac.verify_slice(&expected).is_ok())
            .unwrap_or(false)
    });

    if !valid {
        return Err(WebhookError::InvalidSignature);
    }

    if (now.timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(WebhookError::Expired);
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawData,
}

#[derive(Debug, Deserialize)]
struct RawData {
    object: JsonValue,
}

/// A decoded webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CheckoutCompleted {
        session_id: String,
        user_id: Option<Uuid>,
        plan: Option<Plan>,
        payment_intent: Option<String>,
    },
    PaymentSucceeded {
        user_id: Option<Uuid>,
    },
    PaymentFailed {
        user_id: Option<Uuid>,
    },
    /// Any event type this service does not act on
    Other(String),
}

fn string_at<'a>(object: &'a JsonValue, pointer: &str) -> Option<&'a str> {
    object.pointer(pointer).and_then(JsonValue::as_str)
}

fn uuid_at(object: &JsonValue, pointer: &str) -> Option<Uuid> {
    string_at(object, pointer).and_then(|s| Uuid::parse_str(s).ok())
}

/// Decodes a verified payload
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let raw: RawEvent = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
    let object = &raw.data.object;

    let event = match raw.event_type.as_str() {
        "checkout.session.completed" => WebhookEvent::CheckoutCompleted {
            session_id: string_at(object, "/id").unwrap_or_default().to_string(),
            user_id: uuid_at(object, "/client_reference_id")
                .or_else(|| uuid_at(object, "/metadata/user_id")),
            plan: string_at(object, "/metadata/plan").and_then(Plan::from_str),
            payment_intent: string_at(object, "/payment_intent").map(str::to_string),
        },
        "payment_intent.succeeded" => WebhookEvent::PaymentSucceeded {
            user_id: uuid_at(object, "/metadata/user_id"),
        },
        "payment_intent.payment_failed" => WebhookEvent::PaymentFailed {
            user_id: uuid_at(object, "/metadata/user_id"),
        },
        other => WebhookEvent::Other(other.to_string()),
    };

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_valid_signature() {
        let now = Utc::now();
        let payload = br#"{"type":"ping"}"#;
        let header = format!("t={},v1={}", now.timestamp(), sign(SECRET, now.timestamp(), payload).unwrap());
        assert!(verify_signature(payload, Some(&header), SECRET, now).is_ok());
    }

    #[test]
    fn test_any_v1_may_match() {
        let now = Utc::now();
        let payload = b"{}";
        let header = format!(
            "t={},v1=deadbeef,v0=ignored,v1={}",
            now.timestamp(),
            sign(SECRET, now.timestamp(), payload).unwrap()
        );
        assert!(verify_signature(payload, Some(&header), SECRET, now).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let now = Utc::now();
        let header = format!("t={},v1={}", now.timestamp(), sign(SECRET, now.timestamp(), b"{}").unwrap());
        assert!(matches!(
            verify_signature(b"{\"x\":1}", Some(&header), SECRET, now),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_old_delivery_rejected() {
        let now = Utc::now();
        let sent = now.timestamp() - SIGNATURE_TOLERANCE_SECS - 1;
        let header = format!("t={},v1={}", sent, sign(SECRET, sent, b"{}").unwrap());
        assert!(matches!(
            verify_signature(b"{}", Some(&header), SECRET, now),
            Err(WebhookError::Expired)
        ));
    }

    #[test]
    fn test_malformed_headers() {
        let now = Utc::now();
        assert!(matches!(
            verify_signature(b"{}", None, SECRET, now),
            Err(WebhookError::MissingSignature)
        ));
        assert!(matches!(
            verify_signature(b"{}", Some("v1=abc"), SECRET, now),
            Err(WebhookError::MalformedHeader)
        ));
        assert!(matches!(
            verify_signature(b"{}", Some("t=abc,v1=abc"), SECRET, now),
            Err(WebhookError::MalformedHeader)
        ));
        assert!(matches!(
            verify_signature(b"{}", Some("t=1"), SECRET, now),
            Err(WebhookError::MalformedHeader)
        ));
    }

    #[test]
    fn test_parse_checkout_completed() {
        let user_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_1",
                "client_reference_id": user_id.to_string(),
                "payment_intent": "pi_1",
                "metadata": {"plan": "professional"}
            }}
        });

        let event = parse_event(payload.to_string().as_bytes()).unwrap();
        assert_eq!(
            event,
            WebhookEvent::CheckoutCompleted {
                session_id: "cs_1".to_string(),
                user_id: Some(user_id),
                plan: Some(Plan::Professional),
                payment_intent: Some("pi_1".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_payment_events() {
        let user_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "type": "payment_intent.payment_failed",
            "data": {"object": {"metadata": {"user_id": user_id.to_string()}}}
        });
        assert_eq!(
            parse_event(payload.to_string().as_bytes()).unwrap(),
            WebhookEvent::PaymentFailed { user_id: Some(user_id) }
        );

        let payload = serde_json::json!({"type": "invoice.paid", "data": {"object": {}}});
        assert_eq!(
            parse_event(payload.to_string().as_bytes()).unwrap(),
            WebhookEvent::Other("invoice.paid".to_string())
        );

        assert!(parse_event(b"not json").is_err());
    }
}

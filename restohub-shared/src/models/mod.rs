/// Database models for RestoHub
///
/// Each submodule owns one table (or a family of tables) and its queries.
///
/// # Models
///
/// - `user`: accounts, roles and verification state
/// - `profile`: one profile per user
/// - `otp`: one-time codes for verification and password reset
/// - `onboarding`: the nine-step onboarding wizard
/// - `document`: uploaded document metadata
/// - `subscription`: billing plans mirrored from the payment processor
/// - `calendar`: per-user calendar events
/// - `metrics`: per-role dashboard tables filled from extracted documents
///
/// # Example
///
/// ```no_run
/// use restohub_shared::models::user::{User, CreateUser, Role};
/// use restohub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "owner@bistro.com".to_string(),
///     password_hash: Some("$argon2id$...".to_string()),
///     role: Role::Operations,
///     is_verified: false,
/// }).await?;
/// # Ok(())
/// # }
/// ```

use std::borrow::Cow;

use serde::{Deserialize, Deserializer};
use validator::ValidationError;

pub mod calendar;
pub mod document;
pub mod metrics;
pub mod onboarding;
pub mod otp;
pub mod profile;
pub mod subscription;
pub mod user;

/// Deserializes a field that distinguishes "absent" from "explicitly null"
///
/// Use with `#[serde(default, deserialize_with = "double_option")]` on an
/// `Option<Option<T>>`: a missing key stays `None`, `null` becomes
/// `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Builds a validation error with a human-readable message
pub fn field_error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// Trims an optional string and collapses blank values to `None`
pub fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        name: Option<Option<String>>,
    }

    #[test]
    fn test_double_option_distinguishes_null_from_missing() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.name, None);

        let null: Patch = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert_eq!(null.name, Some(None));

        let set: Patch = serde_json::from_str(r#"{"name": "Luigi"}"#).unwrap();
        assert_eq!(set.name, Some(Some("Luigi".to_string())));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text(Some("  hi ".to_string())), Some("hi".to_string()));
        assert_eq!(clean_text(Some("   ".to_string())), None);
        assert_eq!(clean_text(None), None);
    }

    #[test]
    fn test_field_error_message() {
        let error = field_error("length", "Too long");
        assert_eq!(error.code, "length");
        assert_eq!(error.message.as_deref(), Some("Too long"));
    }
}

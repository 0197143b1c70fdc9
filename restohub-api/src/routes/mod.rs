/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: registration, login, OTP, passwords, tokens and account removal
/// - `profile`: the caller's profile and picture
/// - `onboarding`: the nine-step onboarding wizard
/// - `documents`: uploaded documents
/// - `subscriptions`: plans, checkout and payment redirects
/// - `webhook`: signed payment processor callbacks
/// - `calendar`: calendar events
/// - `metrics`: per-role dashboard tables

pub mod auth;
pub mod calendar;
pub mod documents;
pub mod health;
pub mod metrics;
pub mod onboarding;
pub mod profile;
pub mod subscriptions;
pub mod webhook;

use restohub_shared::storage::MediaStore;
use serde::Serialize;
use validator::ValidationErrors;

use crate::error::{validation_details, ApiError, ApiResult, ErrorDetails};

/// Collects "This field is required" errors for a request
#[derive(Debug, Default)]
pub(crate) struct RequiredFields {
    details: ErrorDetails,
}

impl RequiredFields {
    /// Returns the trimmed value, or records the field as missing
    pub fn take(&mut self, name: &str, value: Option<String>) -> String {
        match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(v) => v,
            None => {
                self.details
                    .insert(name.to_string(), vec!["This field is required".to_string()]);
                String::new()
            }
        }
    }

    /// Like [`take`](Self::take) but keeps surrounding whitespace; for passwords
    pub fn take_raw(&mut self, name: &str, value: Option<String>) -> String {
        match value.filter(|v| !v.is_empty()) {
            Some(v) => v,
            None => {
                self.details
                    .insert(name.to_string(), vec!["This field is required".to_string()]);
                String::new()
            }
        }
    }

    /// Whether an error was already recorded for `name`
    pub fn has(&self, name: &str) -> bool {
        self.details.contains_key(name)
    }

    /// Records every message from a derived validation
    pub fn merge(&mut self, errors: &ValidationErrors) {
        for (field, messages) in validation_details(errors) {
            self.details.entry(field).or_default().extend(messages);
        }
    }

    /// Adds an error unrelated to presence
    pub fn reject(&mut self, name: &str, message: impl Into<String>) {
        self.details
            .entry(name.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn finish(self, message: &str) -> ApiResult<()> {
        if self.details.is_empty() {
            Ok(())
        } else {
            Err(ApiError::invalid(message, self.details))
        }
    }
}

/// `{success, count, data}` list envelope
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub count: usize,
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

/// `{success, message, data}` envelope for single records
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// `{success, message}` acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Removes stored files, logging failures instead of failing the request
pub(crate) async fn remove_files(media: &dyn MediaStore, paths: &[String]) {
    for path in paths {
        if let Err(e) = media.delete(path).await {
            tracing::warn!(path = %path, error = %e, "Failed to remove stored file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields_collects_missing() {
        let mut fields = RequiredFields::default();
        let email = fields.take("email", Some("  a@b.io ".to_string()));
        let otp = fields.take("otp", Some("   ".to_string()));
        let password = fields.take_raw("password", None);

        assert_eq!(email, "a@b.io");
        assert!(otp.is_empty());
        assert!(password.is_empty());

        let err = fields.finish("Invalid data").unwrap_err();
        match err {
            ApiError::BadRequest { details, .. } => {
                assert_eq!(details.len(), 2);
                assert!(details.contains_key("otp"));
                assert!(details.contains_key("password"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_required_fields_pass() {
        let mut fields = RequiredFields::default();
        fields.take("email", Some("a@b.io".to_string()));
        assert!(fields.finish("Invalid data").is_ok());
    }

    #[test]
    fn test_required_fields_merges_validation_errors() {
        let mut errors = ValidationErrors::new();
        errors.add(
            "email",
            restohub_shared::models::field_error("email", "Enter a valid email address."),
        );

        let mut fields = RequiredFields::default();
        fields.merge(&errors);
        fields.take("password", None);

        match fields.finish("Registration failed").unwrap_err() {
            ApiError::BadRequest { details, .. } => {
                assert_eq!(details["email"], vec!["Enter a valid email address."]);
                assert_eq!(details["password"], vec!["This field is required"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_list_response_counts() {
        let list = ListResponse::new(vec![1, 2, 3]);
        assert_eq!(list.count, 3);
        assert!(list.success);
    }
}

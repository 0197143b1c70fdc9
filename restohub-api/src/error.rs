/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`; every error renders as
///
/// ```json
/// {"error": true, "code": "bad_request", "message": "...", "details": {"field": ["..."]}}
/// ```
///
/// # Example
///
/// ```
/// use restohub_api::error::{ApiError, ApiResult};
///
/// fn check_plan(plan: Option<&str>) -> ApiResult<&str> {
///     plan.ok_or_else(|| ApiError::field("Plan is required", "plan", "This field is required."))
/// }
/// ```

use std::collections::BTreeMap;
use std::fmt;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use restohub_shared::{
    auth::{
        google::VerifyError,
        jwt::JwtError,
        middleware::{AuthError, AuthzError},
        password::PasswordError,
    },
    billing::{webhook::WebhookError, GatewayError},
    mail::MailError,
    storage::StorageError,
};
use serde::{Deserialize, Serialize};
use validator::{ValidationErrors, ValidationErrorsKind};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Per-field error messages
pub type ErrorDetails = BTreeMap<String, Vec<String>>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400), optionally with per-field details
    BadRequest { message: String, details: ErrorDetails },

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409)
    Conflict(String),

    /// Too many requests (429)
    TooManyRequests(String),

    /// Internal server error (500); the message is logged, never returned
    InternalError(String),

    /// Upstream service failed (502)
    BadGateway(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub code: String,
    pub message: String,
    pub details: ErrorDetails,
}

impl ApiError {
    /// Plain 400 without details
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            details: ErrorDetails::new(),
        }
    }

    /// 400 carrying one message for one field
    pub fn field(message: impl Into<String>, field: &str, detail: impl Into<String>) -> Self {
        let mut details = ErrorDetails::new();
        details.insert(field.to_string(), vec![detail.into()]);
        ApiError::BadRequest {
            message: message.into(),
            details,
        }
    }

    /// 400 with prepared details
    pub fn invalid(message: impl Into<String>, details: ErrorDetails) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            details,
        }
    }

    /// Replaces the headline message, keeping any details
    pub fn with_message(self, message: impl Into<String>) -> Self {
        match self {
            ApiError::BadRequest { details, .. } => ApiError::BadRequest {
                message: message.into(),
                details,
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::TooManyRequests(_) => "too_many_requests",
            ApiError::InternalError(_) => "internal_error",
            ApiError::BadGateway(_) => "bad_gateway",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest { message, details } if details.is_empty() => {
                write!(f, "Bad request: {}", message)
            }
            ApiError::BadRequest { message, details } => {
                write!(f, "Bad request: {} ({} fields)", message, details.len())
            }
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::TooManyRequests(msg) => write!(f, "Too many requests: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();

        let (message, details) = match self {
            ApiError::BadRequest { message, details } => (message, details),
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("An internal error occurred".to_string(), ErrorDetails::new())
            }
            ApiError::BadGateway(msg) => {
                tracing::error!(error = %msg, "Upstream service failed");
                ("Payment processor request failed".to_string(), ErrorDetails::new())
            }
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::TooManyRequests(msg)
            | ApiError::ServiceUnavailable(msg) => (msg, ErrorDetails::new()),
        };

        let body = Json(ErrorResponse {
            error: true,
            code,
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Flattens validator output into field → messages
pub fn validation_details(errors: &ValidationErrors) -> ErrorDetails {
    let mut details = ErrorDetails::new();

    for (field, kind) in errors.errors() {
        let messages = match kind {
            ValidationErrorsKind::Field(list) => list
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => default_message(&e.code),
                })
                .collect(),
            ValidationErrorsKind::Struct(_) | ValidationErrorsKind::List(_) => {
                vec!["Invalid value.".to_string()]
            }
        };
        details.insert(field.to_string(), messages);
    }

    details
}

fn default_message(code: &str) -> String {
    match code {
        "range" => "Ensure this value is within the allowed range.".to_string(),
        "length" => "Ensure this field has a valid length.".to_string(),
        "email" => "Enter a valid email address.".to_string(),
        "url" => "Enter a valid URL.".to_string(),
        "required" => "This field is required.".to_string(),
        other => format!("Invalid value ({}).", other),
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::invalid("Validation failed", validation_details(&errors))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("email") {
                        return ApiError::Conflict("Email already exists".to_string());
                    }
                    if db_err.is_unique_violation() {
                        return ApiError::Conflict("Resource already exists".to_string());
                    }
                    if db_err.is_check_violation() {
                        return ApiError::bad_request(format!("Invalid value ({})", constraint));
                    }
                }
                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::DatabaseError(e) => e.into(),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => ApiError::InternalError(format!("Token creation failed: {}", msg)),
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            other => ApiError::Unauthorized(format!("Invalid token: {}", other)),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConfigured => {
                ApiError::ServiceUnavailable("Payments are not configured".to_string())
            }
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::InvalidPayload(_) => ApiError::bad_request("Invalid payload"),
            _ => ApiError::bad_request("Invalid signature"),
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::InvalidToken(reason) => {
                ApiError::field("Invalid Google token", "id_token", reason)
            }
            VerifyError::MissingEmail => ApiError::field(
                "Email not provided by Google",
                "email",
                "Email is required from Google account",
            ),
            VerifyError::Unavailable(reason) => ApiError::ServiceUnavailable(format!(
                "Google authentication failed: {}",
                reason
            )),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::InternalError(format!("Storage error: {}", err))
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{Validate, ValidationError};

    #[test]
    fn test_error_display() {
        let err = ApiError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "Not found: User not found");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::TooManyRequests("x".into()).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::from(GatewayError::NotConfigured).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(WebhookError::InvalidSignature).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::MissingCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthzError::AdminOnly).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(range(min = 0))]
        amount: i32,
    }

    #[test]
    fn test_validation_details() {
        let errors = Sample { amount: -1 }.validate().unwrap_err();
        let details = validation_details(&errors);
        assert_eq!(details.len(), 1);
        assert_eq!(details["amount"].len(), 1);

        let mut errors = ValidationErrors::new();
        let mut error = ValidationError::new("required");
        error.message = Some("This field is required.".into());
        errors.add("email", error);
        let details = validation_details(&errors);
        assert_eq!(details["email"], vec!["This field is required."]);
    }

    #[tokio::test]
    async fn test_response_envelope() {
        let response = ApiError::field("Registration failed", "email", "Taken").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], true);
        assert_eq!(body["code"], "bad_request");
        assert_eq!(body["message"], "Registration failed");
        assert_eq!(body["details"]["email"][0], "Taken");
    }

    #[tokio::test]
    async fn test_internal_errors_are_sanitized() {
        let response = ApiError::InternalError("connection refused at 10.0.0.3".into()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["message"], "An internal error occurred");
    }
}

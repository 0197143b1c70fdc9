/// Request authentication and role checks for Axum
///
/// Protected routes expect `Authorization: Bearer <access token>`. The
/// token is validated, the user is loaded, and an [`AuthContext`] is put
/// into the request extensions for handlers to extract.
///
/// # Example
///
/// ```no_run
/// use axum::Extension;
/// use restohub_shared::auth::middleware::{require_role, AuthContext};
/// use restohub_shared::models::user::Role;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     match require_role(&auth, Role::Executive) {
///         Ok(()) => format!("Welcome, {}", auth.email),
///         Err(e) => e.to_string(),
///     }
/// }
/// ```

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};
use crate::models::user::{Role, User};

/// Authenticated caller, added to request extensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,

    /// `None` if the stored role is not one we know
    pub role: Option<Role>,

    pub is_staff: bool,
    pub is_verified: bool,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.get_role(),
            is_staff: user.is_staff,
            is_verified: user.is_verified,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header
    #[error("Authentication credentials were not provided.")]
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    #[error("Expected Bearer token")]
    InvalidFormat,

    /// Token failed validation
    #[error("Given token not valid for any token type")]
    InvalidToken(#[from] JwtError),

    /// Token was fine but the account is gone or disabled
    #[error("User not found or inactive")]
    InactiveUser,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Caller's role does not grant access
    #[error("This resource requires the {required} role")]
    InsufficientRole { required: Role },

    /// Admin-only operation
    #[error("Only administrators can perform this action")]
    AdminOnly,
}

/// Extracts the bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidFormat)
}

/// Authenticates a request from its headers
///
/// # Errors
///
/// - `MissingCredentials` / `InvalidFormat` for a missing or malformed header
/// - `InvalidToken` for a bad, expired or refresh token
/// - `InactiveUser` if the user was deleted or deactivated
pub async fn authenticate(
    pool: &PgPool,
    secret: &str,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;
    let claims = validate_access_token(token, secret)?;

    let user = User::find_by_id(pool, claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AuthError::InactiveUser)?;

    Ok(AuthContext::from_user(&user))
}

/// Requires the caller to hold `role`; admins pass every check
pub fn require_role(auth: &AuthContext, role: Role) -> Result<(), AuthzError> {
    if auth.is_admin() || auth.role == Some(role) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole { required: role })
    }
}

/// Requires the caller to be an administrator
pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::AdminOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn context(role: Role) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            email: "owner@bistro.com".to_string(),
            role: Some(role),
            is_staff: role == Role::Admin,
            is_verified: true,
        }
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingCredentials)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn test_role_checks() {
        let ops = context(Role::Operations);
        assert!(require_role(&ops, Role::Operations).is_ok());
        assert!(matches!(
            require_role(&ops, Role::Executive),
            Err(AuthzError::InsufficientRole { required: Role::Executive })
        ));
        assert!(require_admin(&ops).is_err());

        let admin = context(Role::Admin);
        assert!(require_role(&admin, Role::MarketingManager).is_ok());
        assert!(require_admin(&admin).is_ok());
    }

    #[test]
    fn test_unknown_role_denied() {
        let mut auth = context(Role::Operations);
        auth.role = None;
        assert!(require_role(&auth, Role::Operations).is_err());
    }
}

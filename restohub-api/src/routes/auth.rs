/// Authentication and account endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/register/` - Register and receive a verification code
/// - `POST /api/auth/login/` - Login and get tokens
/// - `POST /api/auth/otp/create/` - Resend a verification code
/// - `POST /api/auth/otp/verify/` - Verify an email address
/// - `POST /api/auth/password-reset/request/` - Send a password reset code
/// - `POST /api/auth/reset/otp-verify/` - Check a reset code without using it
/// - `POST /api/auth/password-reset/confirm/` - Set a new password with a code
/// - `POST /api/auth/password-change/` - Change password (authenticated)
/// - `POST /api/auth/refresh-token/` - Rotate tokens
/// - `POST /api/auth/google-login/` - Login or sign up with a Google ID token
/// - `GET /api/auth/users/` - List users (admin)
/// - `DELETE /api/auth/users/:id/` - Delete a user (admin)
/// - `DELETE /api/auth/account/` - Delete the caller's account

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use restohub_shared::{
    auth::{
        jwt,
        middleware::{require_admin, AuthContext},
        otp::{self, generate_otp},
        password,
    },
    mail::OtpPurpose,
    models::{
        clean_text,
        otp::{Otp, OtpCheck},
        profile::{CreateProfile, UserProfile},
        user::{CreateUser, Role, User},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{
    profile::ProfileView,
    remove_files, MessageResponse, RequiredFields,
};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{JsonBody, PathParam},
};

/// Register request
///
/// Fields are optional at the type level so that missing ones are reported
/// together, per field.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub full_name: Option<String>,
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub business_name: Option<String>,
    pub role: Option<String>,
}

impl RegisterRequest {
    /// Trims text fields; blanks become missing
    fn normalized(self) -> Self {
        Self {
            email: clean_text(self.email).map(|e| e.to_lowercase()),
            full_name: clean_text(self.full_name),
            business_name: clean_text(self.business_name),
            role: clean_text(self.role),
            ..self
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: RegisteredUser,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// User summary embedded in login responses
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub email: String,
    pub role: String,
    pub is_verified: bool,
    pub profile: ProfileView,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    pub user: SessionUser,

    /// Only present for Google logins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_user: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    pub id_token: Option<String>,
}

/// A user as listed to administrators
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub profile: Option<ProfileView>,
}

/// Issues a fresh code for `email` and sends it
async fn issue_otp(state: &AppState, email: &str, purpose: OtpPurpose) -> ApiResult<()> {
    let code = generate_otp();
    Otp::replace(&state.db, email, &code).await?;

    state.mailer.send_otp(email, &code, purpose).await.map_err(|e| {
        tracing::error!(email = %email, error = %e, "Failed to send OTP");
        ApiError::InternalError(format!("Failed to send OTP email: {}", e))
    })?;

    tracing::info!(email = %email, purpose = ?purpose, "OTP issued");
    Ok(())
}

/// Checks a submitted code, counting wrong guesses
async fn check_otp(state: &AppState, email: &str, submitted: &str, missing: &str) -> ApiResult<Otp> {
    if !otp::is_well_formed(submitted) {
        return Err(ApiError::field("Invalid OTP", "otp", "The OTP must be 6 digits"));
    }

    let otp = Otp::find_by_email(&state.db, email)
        .await?
        .ok_or_else(|| ApiError::NotFound(missing.to_string()))?;

    match otp.check(submitted, Utc::now()) {
        OtpCheck::Valid => Ok(otp),
        OtpCheck::TooManyAttempts => Err(ApiError::TooManyRequests(
            "Too many incorrect attempts. Please request a new OTP".to_string(),
        )),
        OtpCheck::Expired => Err(ApiError::field(
            "OTP expired",
            "otp",
            "The OTP has expired. Please request a new one",
        )),
        OtpCheck::Mismatch => {
            let attempts = Otp::record_failed_attempt(&state.db, otp.id).await?;
            tracing::warn!(email = %email, attempts, "Incorrect OTP submitted");
            Err(ApiError::field("Invalid OTP", "otp", "The provided OTP is invalid"))
        }
    }
}

fn password_errors(field: &str, errors: Vec<String>) -> ApiResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        let mut details = crate::error::ErrorDetails::new();
        details.insert(field.to_string(), errors);
        Err(ApiError::invalid("Password is too weak", details))
    }
}

async fn session_response(
    state: &AppState,
    user: &User,
    message: &str,
    profile_name: &str,
    is_new_user: Option<bool>,
) -> ApiResult<LoginResponse> {
    let profile = UserProfile::get_or_create(&state.db, user.id, profile_name).await?;
    User::update_last_login(&state.db, user.id).await?;
    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    Ok(LoginResponse {
        success: true,
        message: message.to_string(),
        access_token: tokens.access,
        refresh_token: tokens.refresh,
        user: SessionUser {
            email: user.email.clone(),
            role: user.role.clone(),
            is_verified: user.is_verified,
            profile: ProfileView::new(profile, &user.email, &user.role, state.media.as_ref()),
        },
        is_new_user,
    })
}

/// Register a new user
///
/// Creates the user and profile in one transaction. An earlier unverified
/// sign-up with the same email is replaced. The account must then be
/// verified with the code sent by email.
///
/// # Errors
///
/// - `400 Bad Request`: missing fields, password mismatch or weakness,
///   invalid role, or email taken by a verified account
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let req = req.normalized();

    let mut fields = RequiredFields::default();
    if let Err(errors) = req.validate() {
        fields.merge(&errors);
    }
    let email = fields.take("email", req.email);
    let password = fields.take_raw("password", req.password);
    let confirm_password = fields.take_raw("confirm_password", req.confirm_password);
    let full_name = fields.take("full_name", req.full_name);
    let business_name = fields.take("business_name", req.business_name);
    let role = fields.take("role", req.role);

    let role = match Role::from_str(&role) {
        Some(r) if r.is_self_assignable() => Some(r),
        _ if role.is_empty() => None,
        _ => {
            fields.reject(
                "role",
                "Select a valid role: operations, marketing manager or executive.",
            );
            None
        }
    };
    if !password.is_empty() && !confirm_password.is_empty() && password != confirm_password {
        fields.reject("confirm_password", "Passwords do not match.");
    }
    if !password.is_empty() {
        for message in password::validate_password_strength(&password, &email) {
            fields.reject("password", message);
        }
    }
    fields.finish("Registration failed")?;

    let role = role.ok_or_else(|| ApiError::bad_request("Registration failed"))?;

    if let Some(existing) = User::find_by_email(&state.db, &email).await? {
        if existing.is_verified {
            return Err(ApiError::field(
                "Registration failed",
                "email",
                "A user with this email already exists.",
            ));
        }
    }

    let password_hash = password::hash_password(&password)?;

    let mut tx = state.db.begin().await?;
    let replaced = User::delete_unverified_by_email(&mut *tx, &email).await?;
    let user = User::create(
        &mut *tx,
        CreateUser {
            email: email.clone(),
            password_hash: Some(password_hash),
            role,
            is_verified: false,
        },
    )
    .await?;
    UserProfile::create(
        &mut *tx,
        CreateProfile {
            user_id: user.id,
            full_name: Some(full_name),
            business_name: Some(business_name),
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, role = %user.role, replaced, "User registered");

    issue_otp(&state, &user.email, OtpPurpose::Verification).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "Registration successful! Please verify your email with the OTP sent to your inbox"
                .to_string(),
            user: RegisteredUser {
                email: user.email,
                role: user.role,
            },
        }),
    ))
}

/// Login with email and password
///
/// # Errors
///
/// - `400 Bad Request`: missing fields
/// - `401 Unauthorized`: invalid credentials or inactive account
/// - `403 Forbidden`: email not verified yet
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let mut fields = RequiredFields::default();
    let email = fields.take("email", req.email);
    let password = fields.take_raw("password", req.password);
    fields.finish("Login failed")?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &email).await?.ok_or_else(invalid)?;
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !password::verify_password(&password, hash)? {
        tracing::warn!(user_id = %user.id, "Failed login attempt");
        return Err(invalid());
    }

    if !user.is_active {
        return Err(ApiError::Unauthorized("This account has been disabled".to_string()));
    }
    if !user.is_verified {
        return Err(ApiError::Forbidden(
            "Please verify your email before logging in. Request a new OTP if needed".to_string(),
        ));
    }

    let response =
        session_response(&state, &user, "Login successful", user.email_local_part(), None).await?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(response))
}

/// Send a new verification code
pub async fn create_otp(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let mut fields = RequiredFields::default();
    let email = fields.take("email", req.email);
    fields.finish("Invalid data")?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with this email".to_string()))?;
    if user.is_verified {
        return Err(ApiError::field(
            "Already verified",
            "email",
            "This account is already verified",
        ));
    }

    issue_otp(&state, &user.email, OtpPurpose::Verification).await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::new("OTP sent to your email"))))
}

/// Verify an email address with its code
///
/// # Errors
///
/// - `400 Bad Request`: missing fields, wrong or expired code, already verified
/// - `404 Not Found`: no code or no user for the email
/// - `429 Too Many Requests`: too many wrong codes
pub async fn verify_otp(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<OtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let mut fields = RequiredFields::default();
    let email = fields.take("email", req.email);
    let code = fields.take("otp", req.otp);
    fields.finish("Invalid data")?;

    check_otp(&state, &email, &code, "No OTP found for this email").await?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with this email".to_string()))?;
    if user.is_verified {
        return Err(ApiError::field(
            "Already verified",
            "email",
            "This account is already verified",
        ));
    }

    User::mark_verified(&state.db, user.id).await?;
    Otp::delete_for_email(&state.db, &email).await?;

    tracing::info!(user_id = %user.id, "Email verified");
    Ok(Json(MessageResponse::new("Email verified successfully. You can now log in")))
}

/// Send a password reset code
pub async fn request_password_reset(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let mut fields = RequiredFields::default();
    let email = fields.take("email", req.email);
    fields.finish("Invalid data")?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with this email".to_string()))?;
    if !user.is_verified {
        return Err(ApiError::field(
            "Email not verified",
            "email",
            "Please verify your email before resetting your password",
        ));
    }

    issue_otp(&state, &user.email, OtpPurpose::PasswordReset).await?;

    Ok(Json(MessageResponse::new(
        "Password reset OTP sent to your email. Please check your inbox",
    )))
}

/// Check a reset code without consuming it
pub async fn verify_reset_otp(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<OtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let mut fields = RequiredFields::default();
    let email = fields.take("email", req.email);
    let code = fields.take("otp", req.otp);
    fields.finish("Invalid data")?;

    check_otp(
        &state,
        &email,
        &code,
        "No valid OTP found. Please request password reset again",
    )
    .await?;

    Ok(Json(MessageResponse::new(
        "OTP verified successfully. You can now reset your password",
    )))
}

/// Set a new password using a reset code
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResetConfirmRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let mut fields = RequiredFields::default();
    let email = fields.take("email", req.email);
    let code = fields.take("otp", req.otp);
    let new_password = fields.take_raw("new_password", req.new_password);
    let confirm_password = fields.take_raw("confirm_password", req.confirm_password);
    if !new_password.is_empty() && !confirm_password.is_empty() && new_password != confirm_password {
        fields.reject("confirm_password", "Passwords do not match.");
    }
    fields.finish("Password reset failed")?;

    check_otp(
        &state,
        &email,
        &code,
        "No valid OTP found. Please request password reset again",
    )
    .await?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with this email".to_string()))?;
    if !user.is_verified {
        return Err(ApiError::field(
            "Email not verified",
            "email",
            "Please verify your email before resetting your password",
        ));
    }

    password_errors(
        "new_password",
        password::validate_password_strength(&new_password, &user.email),
    )?;

    let hash = password::hash_password(&new_password)?;
    User::set_password(&state.db, user.id, &hash).await?;
    Otp::delete_for_email(&state.db, &email).await?;

    tracing::info!(user_id = %user.id, "Password reset");
    Ok(Json(MessageResponse::new(
        "Password reset successful. You can now login with your new password",
    )))
}

/// Change the caller's password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let mut fields = RequiredFields::default();
    let current = fields.take_raw("current_password", req.current_password);
    let new_password = fields.take_raw("new_password", req.new_password);
    fields.finish("Invalid data")?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    let matches = match user.password_hash.as_deref() {
        Some(hash) => password::verify_password(&current, hash)?,
        None => false,
    };
    if !matches {
        return Err(ApiError::field(
            "Password change failed",
            "current_password",
            "The current password is incorrect",
        ));
    }

    password_errors(
        "new_password",
        password::validate_password_strength(&new_password, &user.email),
    )?;

    let hash = password::hash_password(&new_password)?;
    User::set_password(&state.db, user.id, &hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// Exchange a refresh token for a new pair
///
/// Both tokens are replaced. Accounts deleted or disabled since the token
/// was issued are refused.
pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let token = req
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Refresh token is required"))?;

    let (user_id, tokens) = jwt::rotate_tokens(token.trim(), state.jwt_secret())
        .map_err(|e| ApiError::field("Failed to refresh token", "refresh_token", e.to_string()))?;

    let active = User::find_by_id(&state.db, user_id)
        .await?
        .map(|u| u.is_active)
        .unwrap_or(false);
    if !active {
        return Err(ApiError::field(
            "Failed to refresh token",
            "refresh_token",
            "User not found or inactive",
        ));
    }

    Ok(Json(RefreshResponse {
        success: true,
        message: "Token refreshed successfully".to_string(),
        access_token: tokens.access,
        refresh_token: tokens.refresh,
    }))
}

/// Login or sign up with a Google ID token
///
/// New accounts get the operations role, no password, and count as
/// verified. Existing unverified accounts become verified.
pub async fn google_login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<GoogleLoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let token = req
        .id_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ApiError::field("Google ID token is required", "id_token", "This field is required")
        })?;

    let identity = state.google.verify(&token).await?;
    let display_name = identity.display_name();

    let (user, created) = match User::find_by_email(&state.db, &identity.email).await? {
        Some(user) => {
            if !user.is_verified {
                User::mark_verified(&state.db, user.id).await?;
            }
            let user = User {
                is_verified: true,
                ..user
            };
            (user, false)
        }
        None => {
            let mut tx = state.db.begin().await?;
            let user = User::create(
                &mut *tx,
                CreateUser {
                    email: identity.email.clone(),
                    password_hash: None,
                    role: Role::Operations,
                    is_verified: true,
                },
            )
            .await?;
            UserProfile::create(
                &mut *tx,
                CreateProfile {
                    user_id: user.id,
                    full_name: Some(display_name.clone()),
                    business_name: None,
                },
            )
            .await?;
            tx.commit().await?;

            tracing::info!(user_id = %user.id, "User created from Google login");
            (user, true)
        }
    };

    if !user.is_active {
        return Err(ApiError::Unauthorized("This account has been disabled".to_string()));
    }

    let message = if created {
        "Account created and logged in successfully"
    } else {
        "Logged in successfully"
    };

    let response = session_response(&state, &user, message, &display_name, Some(created)).await?;
    Ok(Json(response))
}

/// List every user with their profile (admin only)
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    require_admin(&auth)?;

    let users = User::list_all(&state.db).await?;
    let mut summaries = Vec::with_capacity(users.len());

    for user in users {
        let profile = UserProfile::find_by_user(&state.db, user.id)
            .await?
            .map(|p| ProfileView::new(p, &user.email, &user.role, state.media.as_ref()));

        summaries.push(UserSummary {
            id: user.id,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            is_staff: user.is_staff,
            is_verified: user.is_verified,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
            profile,
        });
    }

    Ok(Json(summaries))
}

/// Deletes a user with everything it owns, returning its display name
async fn remove_user(state: &AppState, user: &User) -> ApiResult<String> {
    let name = UserProfile::find_by_user(&state.db, user.id)
        .await?
        .and_then(|p| p.full_name)
        .unwrap_or_else(|| user.email_local_part().to_string());

    let files = User::stored_files(&state.db, user.id).await?;
    User::delete(&state.db, user.id).await?;
    remove_files(state.media.as_ref(), &files).await;

    tracing::info!(user_id = %user.id, files = files.len(), "User deleted");
    Ok(name)
}

/// Delete a user (admin only)
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathParam(user_id): PathParam<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_admin(&auth)?;

    let user = User::find_by_id(&state.db, user_id).await?.ok_or_else(|| {
        ApiError::NotFound(format!("No user found with ID {}", user_id))
    })?;

    let name = remove_user(&state, &user).await?;

    Ok(Json(MessageResponse::new(format!(
        "User {} ({}) and their profile deleted successfully",
        name, user.email
    ))))
}

/// Delete the caller's own account
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MessageResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

    let name = remove_user(&state, &user).await?;

    Ok(Json(MessageResponse::new(format!(
        "Your account {} ({}) has been deleted successfully",
        name, user.email
    ))))
}

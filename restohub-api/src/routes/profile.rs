/// Profile endpoints
///
/// - `GET /api/auth/profile/` - The caller's profile, created on first read
/// - `PUT /api/auth/profile/` - Partial update
/// - `PUT /api/auth/profile/picture/` - Replace the profile picture (multipart)

use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use restohub_shared::{
    auth::middleware::AuthContext,
    models::{
        profile::{UpdateProfile, UserProfile, MAX_PICTURE_BYTES},
        user::email_local_part,
    },
    storage::MediaStore,
};
use serde::Serialize;
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::JsonBody,
    upload::{MultipartForm, IMAGE_KINDS},
};

/// A profile as returned to clients
#[derive(Debug, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub email: String,
    pub role: String,
    pub profile_picture_url: Option<String>,
}

impl ProfileView {
    pub fn new(profile: UserProfile, email: &str, role: &str, media: &dyn MediaStore) -> Self {
        let profile_picture_url = profile.profile_picture.as_deref().map(|p| media.url_for(p));
        Self {
            profile,
            email: email.to_string(),
            role: role.to_string(),
            profile_picture_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub profile: ProfileView,
}

fn role_name(auth: &AuthContext) -> &'static str {
    auth.role.map(|r| r.as_str()).unwrap_or_default()
}

async fn load_or_create(state: &AppState, auth: &AuthContext) -> ApiResult<UserProfile> {
    Ok(UserProfile::get_or_create(&state.db, auth.user_id, email_local_part(&auth.email)).await?)
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = load_or_create(&state, &auth).await?;

    Ok(Json(ProfileResponse {
        success: true,
        message: None,
        profile: ProfileView::new(profile, &auth.email, role_name(&auth), state.media.as_ref()),
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(req): JsonBody<UpdateProfile>,
) -> ApiResult<Json<ProfileResponse>> {
    let req = req.normalized();
    req.validate()
        .map_err(|e| ApiError::from(e).with_message("Invalid profile data"))?;

    load_or_create(&state, &auth).await?;
    let profile = UserProfile::update(&state.db, auth.user_id, req).await?;

    tracing::info!(user_id = %auth.user_id, "Profile updated");

    Ok(Json(ProfileResponse {
        success: true,
        message: Some("Profile updated successfully".to_string()),
        profile: ProfileView::new(profile, &auth.email, role_name(&auth), state.media.as_ref()),
    }))
}

pub async fn update_picture(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<Json<ProfileResponse>> {
    let form = MultipartForm::read(multipart, &[("profile_picture", MAX_PICTURE_BYTES)]).await?;
    let file = form.file("profile_picture").ok_or_else(|| {
        ApiError::field("No file uploaded", "profile_picture", "This field is required")
    })?;
    file.require_kind("profile_picture", IMAGE_KINDS)?;

    load_or_create(&state, &auth).await?;
    let path = state
        .media
        .save("profile_pictures", &file.file_name, &file.bytes)
        .await?;

    let (profile, previous) = match UserProfile::set_picture(&state.db, auth.user_id, &path).await {
        Ok(result) => result,
        Err(e) => {
            super::remove_files(state.media.as_ref(), &[path]).await;
            return Err(e.into());
        }
    };

    if let Some(previous) = previous.filter(|p| *p != path) {
        super::remove_files(state.media.as_ref(), &[previous]).await;
    }

    tracing::info!(user_id = %auth.user_id, path = %path, "Profile picture replaced");

    Ok(Json(ProfileResponse {
        success: true,
        message: Some("Profile picture updated successfully".to_string()),
        profile: ProfileView::new(profile, &auth.email, role_name(&auth), state.media.as_ref()),
    }))
}

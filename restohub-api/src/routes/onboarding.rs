/// Onboarding wizard endpoints
///
/// - `GET /api/auth/onboarding/` - Progress, or `data: null` before the first save
/// - `POST /api/auth/onboarding/` - Start the wizard
/// - `GET /api/auth/onboarding/get/` - Progress, 404 when none exists
/// - `PUT /api/auth/onboarding/update/` - Partial update
/// - `PUT /api/auth/onboarding/files/` - Upload the menu and document files (multipart)

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use restohub_shared::{
    auth::middleware::AuthContext,
    models::onboarding::{
        OnboardingPatch, OnboardingProgress, MAX_DOCUMENT_FILE_BYTES, MAX_MENU_FILE_BYTES,
    },
    storage::{FileKind, MediaStore},
};
use serde::Serialize;

use super::{remove_files, DataResponse};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::JsonBody,
    upload::MultipartForm,
};

const MENU_KINDS: &[FileKind] = &[FileKind::Pdf, FileKind::Jpeg, FileKind::Png, FileKind::Webp];

const DOCUMENT_KINDS: &[FileKind] = &[
    FileKind::Pdf,
    FileKind::Doc,
    FileKind::Docx,
    FileKind::Jpeg,
    FileKind::Png,
    FileKind::Webp,
];

const COMPLETION_MESSAGE: &str = " Congratulations! Your onboarding is now complete.";

/// Progress as returned to clients
#[derive(Debug, Serialize)]
pub struct OnboardingView {
    #[serde(flatten)]
    pub progress: OnboardingProgress,
    pub menu_file_url: Option<String>,
    pub document_file_url: Option<String>,
}

impl OnboardingView {
    fn new(progress: OnboardingProgress, media: &dyn MediaStore) -> Self {
        let menu_file_url = progress.menu_file.as_deref().map(|p| media.url_for(p));
        let document_file_url = progress.document_file.as_deref().map(|p| media.url_for(p));
        Self {
            progress,
            menu_file_url,
            document_file_url,
        }
    }
}

fn invalid(errors: validator::ValidationErrors) -> ApiError {
    ApiError::from(errors).with_message("Invalid data provided")
}

fn not_started() -> ApiError {
    ApiError::NotFound(
        "Onboarding progress not found. Please create onboarding progress first.".to_string(),
    )
}

pub async fn get_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DataResponse<Option<OnboardingView>>>> {
    let progress = OnboardingProgress::find_by_user(&state.db, auth.user_id).await?;

    let response = match progress {
        Some(progress) => DataResponse::new(
            "Onboarding progress retrieved successfully",
            Some(OnboardingView::new(progress, state.media.as_ref())),
        ),
        None => DataResponse::new(
            "No onboarding progress found. You can start your onboarding process.",
            None,
        ),
    };

    Ok(Json(response))
}

pub async fn get_existing(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DataResponse<OnboardingView>>> {
    let progress = OnboardingProgress::find_by_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(
                "No onboarding progress found. Please start your onboarding process.".to_string(),
            )
        })?;

    Ok(Json(DataResponse::new(
        "Onboarding progress retrieved successfully",
        OnboardingView::new(progress, state.media.as_ref()),
    )))
}

pub async fn create_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(patch): JsonBody<OnboardingPatch>,
) -> ApiResult<(StatusCode, Json<DataResponse<OnboardingView>>)> {
    if OnboardingProgress::find_by_user(&state.db, auth.user_id).await?.is_some() {
        return Err(ApiError::field(
            "Onboarding progress already exists. Use PUT method to update.",
            "user",
            "User already has onboarding progress",
        ));
    }

    let patch = patch.normalized();
    let mut progress = OnboardingProgress::blank(auth.user_id);
    progress.apply(&patch);
    patch.validate_against(&progress).map_err(invalid)?;

    let progress = progress.insert(&state.db).await?;

    tracing::info!(user_id = %auth.user_id, step = progress.current_step, "Onboarding started");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(
            "Onboarding progress created successfully",
            OnboardingView::new(progress, state.media.as_ref()),
        )),
    ))
}

pub async fn update_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(patch): JsonBody<OnboardingPatch>,
) -> ApiResult<Json<DataResponse<OnboardingView>>> {
    let mut progress = OnboardingProgress::find_by_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(not_started)?;

    let patch = patch.normalized();
    progress.apply(&patch);
    patch.validate_against(&progress).map_err(invalid)?;

    let progress = progress.save(&state.db).await?;

    tracing::info!(
        user_id = %auth.user_id,
        step = progress.current_step,
        completed = progress.is_completed,
        "Onboarding updated"
    );

    let completion = if progress.is_completed { COMPLETION_MESSAGE } else { "" };

    Ok(Json(DataResponse::new(
        format!("Onboarding progress updated successfully.{}", completion),
        OnboardingView::new(progress, state.media.as_ref()),
    )))
}

/// Stores `menu_file` and/or `document_file`, replacing earlier uploads
pub async fn upload_files(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<Json<DataResponse<OnboardingView>>> {
    let form = MultipartForm::read(
        multipart,
        &[
            ("menu_file", MAX_MENU_FILE_BYTES),
            ("document_file", MAX_DOCUMENT_FILE_BYTES),
        ],
    )
    .await?;
    if form.has_no_files() {
        return Err(ApiError::bad_request(
            "Upload a menu_file or a document_file",
        ));
    }

    if let Some(file) = form.file("menu_file") {
        file.require_kind("menu_file", MENU_KINDS)?;
    }
    if let Some(file) = form.file("document_file") {
        file.require_kind("document_file", DOCUMENT_KINDS)?;
    }

    let mut progress = OnboardingProgress::find_by_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(not_started)?;

    let mut saved = Vec::new();
    let mut replaced = Vec::new();

    if let Some(file) = form.file("menu_file") {
        let path = state.media.save("onboarding/menus", &file.file_name, &file.bytes).await?;
        saved.push(path.clone());
        replaced.extend(progress.menu_file.replace(path));
    }
    if let Some(file) = form.file("document_file") {
        let path = match state
            .media
            .save("onboarding/documents", &file.file_name, &file.bytes)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                remove_files(state.media.as_ref(), &saved).await;
                return Err(e.into());
            }
        };
        saved.push(path.clone());
        replaced.extend(progress.document_file.replace(path));
    }

    let progress = match progress.save(&state.db).await {
        Ok(progress) => progress,
        Err(e) => {
            remove_files(state.media.as_ref(), &saved).await;
            return Err(e.into());
        }
    };
    remove_files(state.media.as_ref(), &replaced).await;

    tracing::info!(user_id = %auth.user_id, files = saved.len(), "Onboarding files uploaded");

    Ok(Json(DataResponse::new(
        "Onboarding files uploaded successfully",
        OnboardingView::new(progress, state.media.as_ref()),
    )))
}

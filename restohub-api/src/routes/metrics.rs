/// Per-role metric endpoints
///
/// One generic handler set serves every metric table:
///
/// - `GET /api/{role}/{kind}/` - The caller's rows
/// - `POST /api/{role}/{kind}/` - Record a row
/// - `DELETE /api/{role}/{kind}/{id}/` - Delete a row
///
/// Callers need the table's role; admins may use every table.

use axum::{extract::State, http::StatusCode, Extension, Json};
use restohub_shared::{
    auth::middleware::{require_role, AuthContext},
    models::{document::UserDocument, metrics::MetricRecord},
};
use uuid::Uuid;
use validator::Validate;

use super::{DataResponse, ListResponse, MessageResponse};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{JsonBody, PathParam},
};

pub async fn list<M: MetricRecord>(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ListResponse<M>>> {
    require_role(&auth, M::ROLE)?;

    let rows = M::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(ListResponse::new(rows)))
}

/// Records one extracted row
///
/// A `source_document_id` must name one of the caller's own documents.
pub async fn create<M: MetricRecord>(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(input): JsonBody<M::Input>,
) -> ApiResult<(StatusCode, Json<DataResponse<M>>)> {
    require_role(&auth, M::ROLE)?;

    input
        .validate()
        .map_err(|e| ApiError::from(e).with_message("Invalid metric data"))?;

    if let Some(document_id) = M::source_document(&input) {
        if !UserDocument::is_owned_by(&state.db, document_id, auth.user_id).await? {
            return Err(ApiError::field(
                "Invalid metric data",
                "source_document_id",
                "Document not found",
            ));
        }
    }

    let row = M::insert(&state.db, auth.user_id, input).await?;

    tracing::info!(user_id = %auth.user_id, table = M::TABLE, "Metric row recorded");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new("Record created successfully", row)),
    ))
}

pub async fn remove<M: MetricRecord>(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_role(&auth, M::ROLE)?;

    if !M::delete_for_user(&state.db, id, auth.user_id).await? {
        return Err(ApiError::NotFound("Record not found".to_string()));
    }

    tracing::info!(user_id = %auth.user_id, table = M::TABLE, id = %id, "Metric row deleted");
    Ok(Json(MessageResponse::new("Record deleted successfully")))
}

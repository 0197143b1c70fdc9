/// Calendar endpoints
///
/// - `GET /api/auth/calendar/events/` - List, optionally bounded by `from` / `to`
///   and filtered by `event_type`
/// - `POST /api/auth/calendar/events/` - Create
/// - `GET /api/auth/calendar/events/:id/` - One event
/// - `PUT /api/auth/calendar/events/:id/` - Partial update
/// - `DELETE /api/auth/calendar/events/:id/` - Delete

use axum::{extract::State, http::StatusCode, Extension, Json};
use restohub_shared::{
    auth::middleware::AuthContext,
    models::calendar::{CalendarEvent, EventFilter, EventInput, EventPatch},
};
use uuid::Uuid;

use super::{DataResponse, ListResponse, MessageResponse};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{JsonBody, PathParam, QueryParams},
};

fn not_found() -> ApiError {
    ApiError::NotFound("Event not found".to_string())
}

fn invalid(errors: validator::ValidationErrors) -> ApiError {
    ApiError::from(errors).with_message("Invalid event data")
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    QueryParams(filter): QueryParams<EventFilter>,
) -> ApiResult<Json<ListResponse<CalendarEvent>>> {
    let events = CalendarEvent::list_for_user(&state.db, auth.user_id, &filter).await?;
    Ok(Json(ListResponse::new(events)))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(input): JsonBody<EventInput>,
) -> ApiResult<(StatusCode, Json<DataResponse<CalendarEvent>>)> {
    let input = input.normalized();
    input.check().map_err(invalid)?;

    let event = CalendarEvent::create(&state.db, auth.user_id, input).await?;

    tracing::info!(user_id = %auth.user_id, event_id = %event.id, "Calendar event created");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new("Event created successfully", event)),
    ))
}

pub async fn get_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Json<DataResponse<CalendarEvent>>> {
    let event = CalendarEvent::find_for_user(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(DataResponse::new("Event retrieved successfully", event)))
}

/// Applies the given fields, then validates the event as a whole
pub async fn update_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(patch): JsonBody<EventPatch>,
) -> ApiResult<Json<DataResponse<CalendarEvent>>> {
    let current = CalendarEvent::find_for_user(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    let input = EventInput::merged(&current, patch).normalized();
    input.check().map_err(invalid)?;

    let event = CalendarEvent::replace(&state.db, id, auth.user_id, input)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(user_id = %auth.user_id, event_id = %event.id, "Calendar event updated");

    Ok(Json(DataResponse::new("Event updated successfully", event)))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !CalendarEvent::delete(&state.db, id, auth.user_id).await? {
        return Err(not_found());
    }

    tracing::info!(user_id = %auth.user_id, event_id = %id, "Calendar event deleted");
    Ok(Json(MessageResponse::new("Event deleted successfully")))
}

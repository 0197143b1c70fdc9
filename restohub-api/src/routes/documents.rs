/// Document endpoints
///
/// - `GET /api/auth/documents/` - List, filtered by `document_type` / `file_format`
/// - `POST /api/auth/documents/` - Upload (multipart: `file`, `document_type`,
///   `file_format`, optional `file_name`)
/// - `GET /api/auth/documents/:id/` - One document
/// - `PUT /api/auth/documents/:id/` - Rename or re-classify
/// - `DELETE /api/auth/documents/:id/` - Delete, with its stored file
///
/// Documents belong to one user; other users get 404.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use restohub_shared::{
    auth::middleware::AuthContext,
    models::document::{
        CreateDocument, DocumentFilter, DocumentType, FileFormat, UpdateDocument, UserDocument,
        MAX_DOCUMENT_BYTES,
    },
    storage::MediaStore,
};
use serde::Serialize;
use uuid::Uuid;

use super::{remove_files, DataResponse, ListResponse, MessageResponse, RequiredFields};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{JsonBody, PathParam, QueryParams},
    upload::MultipartForm,
};

const MAX_FILE_NAME_CHARS: usize = 255;

/// A document as returned to clients
#[derive(Debug, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: UserDocument,
    pub file_url: String,
}

impl DocumentView {
    fn new(document: UserDocument, media: &dyn MediaStore) -> Self {
        let file_url = media.url_for(&document.file_path);
        Self { document, file_url }
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Document not found".to_string())
}

fn check_file_name(fields: &mut RequiredFields, name: &str) {
    if name.chars().count() > MAX_FILE_NAME_CHARS {
        fields.reject(
            "file_name",
            format!("Ensure this field has no more than {} characters.", MAX_FILE_NAME_CHARS),
        );
    }
}

pub async fn list_documents(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    QueryParams(filter): QueryParams<DocumentFilter>,
) -> ApiResult<Json<ListResponse<DocumentView>>> {
    let documents = UserDocument::list_for_user(&state.db, auth.user_id, &filter).await?;

    let views = documents
        .into_iter()
        .map(|d| DocumentView::new(d, state.media.as_ref()))
        .collect();

    Ok(Json(ListResponse::new(views)))
}

/// Upload a document
///
/// The extension of the uploaded file must match `file_format`. The stored
/// size is the number of bytes received.
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<DataResponse<DocumentView>>)> {
    let mut form = MultipartForm::read(multipart, &[("file", MAX_DOCUMENT_BYTES)]).await?;

    let mut fields = RequiredFields::default();
    let document_type = fields.take("document_type", form.text("document_type").map(str::to_string));
    let file_format = fields.take("file_format", form.text("file_format").map(str::to_string));
    let file = form.take_file("file");
    if file.is_none() {
        fields.reject("file", "No file was submitted.");
    }

    let document_type = DocumentType::from_str(&document_type);
    if document_type.is_none() && !fields.has("document_type") {
        fields.reject("document_type", "Select a valid document type.");
    }
    let file_format = FileFormat::from_str(&file_format);
    if file_format.is_none() && !fields.has("file_format") {
        fields.reject("file_format", "Select a valid file format.");
    }

    let file_name = form
        .text("file_name")
        .map(str::to_string)
        .or_else(|| file.as_ref().map(|f| f.file_name.clone()))
        .unwrap_or_default();
    check_file_name(&mut fields, &file_name);

    if let (Some(file), Some(format)) = (&file, file_format) {
        if !format.matches_file_name(&file.file_name) {
            fields.reject(
                "file",
                format!(
                    "File extension does not match the {} format. Allowed: {}.",
                    format.as_str(),
                    format.extensions().join(", ")
                ),
            );
        }
    }
    fields.finish("Invalid document")?;

    let (Some(file), Some(document_type), Some(file_format)) = (file, document_type, file_format)
    else {
        return Err(ApiError::bad_request("Invalid document"));
    };

    let path = state.media.save("documents", &file.file_name, &file.bytes).await?;
    let created = UserDocument::create(
        &state.db,
        CreateDocument {
            user_id: auth.user_id,
            file_name,
            document_type,
            file_format,
            file_path: path.clone(),
            file_size: file.size() as i64,
        },
    )
    .await;

    let document = match created {
        Ok(document) => document,
        Err(e) => {
            remove_files(state.media.as_ref(), &[path]).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        user_id = %auth.user_id,
        document_id = %document.id,
        size = document.file_size,
        "Document uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(
            "Document uploaded successfully",
            DocumentView::new(document, state.media.as_ref()),
        )),
    ))
}

pub async fn get_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Json<DataResponse<DocumentView>>> {
    let document = UserDocument::find_for_user(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(DataResponse::new(
        "Document retrieved successfully",
        DocumentView::new(document, state.media.as_ref()),
    )))
}

pub async fn update_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(req): JsonBody<UpdateDocument>,
) -> ApiResult<Json<DataResponse<DocumentView>>> {
    let file_name = req.file_name.map(|n| n.trim().to_string());

    let mut fields = RequiredFields::default();
    if let Some(name) = &file_name {
        if name.is_empty() {
            fields.reject("file_name", "This field may not be blank.");
        }
        check_file_name(&mut fields, name);
    }
    fields.finish("Invalid document")?;

    let document = UserDocument::update(
        &state.db,
        id,
        auth.user_id,
        UpdateDocument {
            file_name,
            document_type: req.document_type,
        },
    )
    .await?
    .ok_or_else(not_found)?;

    Ok(Json(DataResponse::new(
        "Document updated successfully",
        DocumentView::new(document, state.media.as_ref()),
    )))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let document = UserDocument::delete(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    remove_files(state.media.as_ref(), &[document.file_path.clone()]).await;

    tracing::info!(user_id = %auth.user_id, document_id = %document.id, "Document deleted");
    Ok(Json(MessageResponse::new(format!(
        "Document {} deleted successfully",
        document.file_name
    ))))
}

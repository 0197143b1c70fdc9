/// Multipart form collection
///
/// Reads a whole `multipart/form-data` body into text fields and files,
/// enforcing a byte limit per file field. Unknown file fields are refused so
/// a client cannot park arbitrary uploads in memory.

use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;
use restohub_shared::storage::{detect_kind, FileKind};

use crate::error::{ApiError, ApiResult};

/// Image formats accepted for pictures
pub const IMAGE_KINDS: &[FileKind] = &[FileKind::Jpeg, FileKind::Png, FileKind::Webp];

/// One uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Checks the file against `allowed`, by extension and content
    pub fn require_kind(&self, field: &str, allowed: &[FileKind]) -> ApiResult<FileKind> {
        detect_kind(&self.file_name, &self.bytes, allowed).ok_or_else(|| {
            ApiError::field(
                "Invalid file",
                field,
                format!("Unsupported file type. Allowed: {}.", describe(allowed)),
            )
        })
    }
}

fn describe(kinds: &[FileKind]) -> String {
    kinds
        .iter()
        .map(|k| match k {
            FileKind::Jpeg => "JPEG",
            FileKind::Png => "PNG",
            FileKind::Webp => "WebP",
            FileKind::Pdf => "PDF",
            FileKind::Doc => "DOC",
            FileKind::Docx => "DOCX",
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn megabytes(limit: usize) -> usize {
    limit / (1024 * 1024)
}

/// A collected multipart body
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    /// Reads every part
    ///
    /// `file_limits` names the accepted file fields with their byte limits.
    /// Parts without a file name are treated as text fields.
    pub async fn read(mut multipart: Multipart, file_limits: &[(&str, usize)]) -> ApiResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let limit = file_limits
                        .iter()
                        .find(|(allowed, _)| *allowed == name)
                        .map(|(_, limit)| *limit)
                        .ok_or_else(|| {
                            ApiError::field("Invalid upload", &name, "Unexpected file field.")
                        })?;

                    let bytes = field.bytes().await?;
                    if bytes.is_empty() {
                        return Err(ApiError::field(
                            "Invalid upload",
                            &name,
                            "The submitted file is empty.",
                        ));
                    }
                    if bytes.len() > limit {
                        return Err(ApiError::field(
                            "File too large",
                            &name,
                            format!("File size cannot exceed {}MB.", megabytes(limit)),
                        ));
                    }

                    form.files.insert(name, UploadedFile { file_name, bytes });
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// A trimmed, non-empty text field
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    /// Whether the body carried no files at all
    pub fn has_no_files(&self) -> bool {
        self.files.is_empty()
    }
}

/// Uploaded file storage
///
/// Files live under a media root on local disk and are addressed by a
/// path relative to it, e.g. `documents/<uuid>_report.pdf`. That relative
/// path is what the database stores. Public URLs are the media base URL
/// joined with the relative path.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

/// Error type for media storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Path escapes the media root
    #[error("Invalid media path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Kinds of uploaded file recognised by content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Jpeg,
    Png,
    Webp,
    Pdf,
    Doc,
    Docx,
}

impl FileKind {
    fn extensions(&self) -> &'static [&'static str] {
        match self {
            FileKind::Jpeg => &["jpg", "jpeg"],
            FileKind::Png => &["png"],
            FileKind::Webp => &["webp"],
            FileKind::Pdf => &["pdf"],
            FileKind::Doc => &["doc"],
            FileKind::Docx => &["docx"],
        }
    }

    fn matches_content(&self, bytes: &[u8]) -> bool {
        match self {
            FileKind::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            FileKind::Png => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
            FileKind::Webp => bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
            FileKind::Pdf => bytes.starts_with(b"%PDF-"),
            FileKind::Doc => bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]),
            FileKind::Docx => bytes.starts_with(b"PK\x03\x04"),
        }
    }
}

/// Extension of a file name, lowercased
pub fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Finds which of `allowed` a file is, by extension and content
///
/// Both must agree; a PNG renamed to `.pdf` matches nothing.
pub fn detect_kind(file_name: &str, bytes: &[u8], allowed: &[FileKind]) -> Option<FileKind> {
    let ext = extension(file_name)?;
    allowed
        .iter()
        .copied()
        .find(|kind| kind.extensions().contains(&ext.as_str()) && kind.matches_content(bytes))
}

/// Reduces an uploaded file name to a safe single path segment
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}

/// Builds a fresh relative path for an upload under `dir`
pub fn unique_path(dir: &str, file_name: &str) -> String {
    format!("{}/{}_{}", dir.trim_matches('/'), Uuid::new_v4().simple(), sanitize_file_name(file_name))
}

/// Storage for uploaded files
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores `bytes` under `dir`, returning the relative path
    async fn save(&self, dir: &str, file_name: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Removes a stored file; missing files are not an error
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Public URL of a stored file
    fn url_for(&self, path: &str) -> String;
}

/// Media store on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    /// Resolves a relative path, refusing anything that leaves the root
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || path.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save(&self, dir: &str, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let relative = unique_path(dir, file_name);
        let full = self.resolve(&relative)?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;

        tracing::debug!(path = %relative, size = bytes.len(), "Stored upload");
        Ok(relative)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => {
                tracing::debug!(path = %path, "Removed stored file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_detect_kind_requires_extension_and_content() {
        let images = [FileKind::Jpeg, FileKind::Png, FileKind::Webp];
        assert_eq!(detect_kind("logo.PNG", PNG, &images), Some(FileKind::Png));
        assert_eq!(detect_kind("logo.jpg", PNG, &images), None);
        assert_eq!(detect_kind("logo", PNG, &images), None);
        assert_eq!(detect_kind("menu.pdf", b"%PDF-1.7", &images), None);
        assert_eq!(
            detect_kind("menu.pdf", b"%PDF-1.7", &[FileKind::Pdf]),
            Some(FileKind::Pdf)
        );
        assert_eq!(
            detect_kind("photo.webp", b"RIFF\x10\0\0\0WEBPVP8 ", &images),
            Some(FileKind::Webp)
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("Q1 sales (final).xlsx"), "Q1_sales__final_.xlsx");
        assert_eq!(sanitize_file_name("..."), "upload");
        assert_eq!(sanitize_file_name("C:\\docs\\menu.pdf"), "menu.pdf");
    }

    #[test]
    fn test_unique_paths_differ() {
        let a = unique_path("documents", "report.pdf");
        let b = unique_path("documents", "report.pdf");
        assert!(a.starts_with("documents/"));
        assert!(a.ends_with("_report.pdf"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let store = LocalMediaStore::new("/tmp/media", "/media");
        assert!(store.resolve("../secret").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("").is_err());
        assert!(store.resolve("documents/a.pdf").is_ok());
    }

    #[test]
    fn test_url_for() {
        let store = LocalMediaStore::new("/tmp/media", "http://localhost:8000/media/");
        assert_eq!(
            store.url_for("profile_pictures/x.png"),
            "http://localhost:8000/media/profile_pictures/x.png"
        );
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let root = std::env::temp_dir().join(format!("restohub-media-{}", Uuid::new_v4()));
        let store = LocalMediaStore::new(&root, "/media");

        let path = store.save("documents", "report.pdf", b"%PDF-1.4").await.unwrap();
        let stored = tokio::fs::read(root.join(&path)).await.unwrap();
        assert_eq!(stored, b"%PDF-1.4");

        store.delete(&path).await.unwrap();
        assert!(!root.join(&path).exists());

        // Deleting twice is fine
        store.delete(&path).await.unwrap();

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}

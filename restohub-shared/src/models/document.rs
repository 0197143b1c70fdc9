/// Uploaded documents
///
/// Metadata lives here; the bytes live in the media store under
/// `file_path`. Documents also serve as provenance for extracted metric
/// rows, whose `source_document_id` is cleared when a document goes away.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// Largest accepted document, in bytes
pub const MAX_DOCUMENT_BYTES: usize = 15 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    All,
    Operations,
    Compliance,
    Finance,
    Legal,
    HrStaff,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::All => "all",
            DocumentType::Operations => "operations",
            DocumentType::Compliance => "compliance",
            DocumentType::Finance => "finance",
            DocumentType::Legal => "legal",
            DocumentType::HrStaff => "hr_staff",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all" => Some(DocumentType::All),
            "operations" => Some(DocumentType::Operations),
            "compliance" => Some(DocumentType::Compliance),
            "finance" => Some(DocumentType::Finance),
            "legal" => Some(DocumentType::Legal),
            "hr_staff" => Some(DocumentType::HrStaff),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Excel,
    Pdf,
    Docs,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Excel => "excel",
            FileFormat::Pdf => "pdf",
            FileFormat::Docs => "docs",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "excel" => Some(FileFormat::Excel),
            "pdf" => Some(FileFormat::Pdf),
            "docs" => Some(FileFormat::Docs),
            _ => None,
        }
    }

    /// File extensions accepted for this format
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            FileFormat::Excel => &["xls", "xlsx", "csv"],
            FileFormat::Pdf => &["pdf"],
            FileFormat::Docs => &["doc", "docx"],
        }
    }

    /// Whether `file_name` carries an extension of this format
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.extensions().contains(&ext.as_str())
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub document_type: String,
    pub file_format: String,
    pub file_path: String,
    pub file_size: i64,
    pub upload_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub user_id: Uuid,
    pub file_name: String,
    pub document_type: DocumentType,
    pub file_format: FileFormat,
    pub file_path: String,
    pub file_size: i64,
}

/// Rename or re-classify a document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDocument {
    pub file_name: Option<String>,
    pub document_type: Option<DocumentType>,
}

/// Optional list filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    pub document_type: Option<DocumentType>,
    pub file_format: Option<FileFormat>,
}

impl UserDocument {
    pub async fn create(pool: &PgPool, data: CreateDocument) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, UserDocument>(
            r#"
            INSERT INTO user_documents
                (user_id, file_name, document_type, file_format, file_path, file_size)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(data.file_name)
        .bind(data.document_type.as_str())
        .bind(data.file_format.as_str())
        .bind(data.file_path)
        .bind(data.file_size)
        .fetch_one(pool)
        .await
    }

    /// Lists a user's documents, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        filter: &DocumentFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM user_documents WHERE user_id = ");
        query.push_bind(user_id);

        if let Some(document_type) = filter.document_type {
            query.push(" AND document_type = ").push_bind(document_type.as_str());
        }
        if let Some(file_format) = filter.file_format {
            query.push(" AND file_format = ").push_bind(file_format.as_str());
        }
        query.push(" ORDER BY upload_date DESC");

        query.build_query_as::<UserDocument>().fetch_all(pool).await
    }

    /// Finds a document owned by `user_id`
    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserDocument>(
            "SELECT * FROM user_documents WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdateDocument,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserDocument>(
            r#"
            UPDATE user_documents
            SET file_name = COALESCE($3, file_name),
                document_type = COALESCE($4, document_type),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(data.file_name)
        .bind(data.document_type.map(|t| t.as_str()))
        .fetch_optional(pool)
        .await
    }

    /// Deletes a document, returning it so the caller can remove the file
    pub async fn delete(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserDocument>(
            "DELETE FROM user_documents WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Whether `id` names a document owned by `user_id`
    pub async fn is_owned_by(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM user_documents WHERE id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_type_strings() {
        assert_eq!(DocumentType::from_str("hr_staff"), Some(DocumentType::HrStaff));
        assert_eq!(DocumentType::HrStaff.as_str(), "hr_staff");
        assert_eq!(DocumentType::from_str("marketing"), None);

        let parsed: DocumentType = serde_json::from_str(r#""hr_staff""#).unwrap();
        assert_eq!(parsed, DocumentType::HrStaff);
    }

    #[test]
    fn test_format_matches_extension() {
        assert!(FileFormat::Pdf.matches_file_name("q3-report.PDF"));
        assert!(FileFormat::Excel.matches_file_name("sales.xlsx"));
        assert!(FileFormat::Excel.matches_file_name("sales.csv"));
        assert!(FileFormat::Docs.matches_file_name("policy.docx"));

        assert!(!FileFormat::Pdf.matches_file_name("sales.xlsx"));
        assert!(!FileFormat::Docs.matches_file_name("README"));
        assert!(!FileFormat::Pdf.matches_file_name(".pdf"));
    }
}

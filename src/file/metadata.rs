//! File metadata types and repository.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};
use thiserror::Error;

use crate::datetime::now_db;
use crate::db::DbPool;
use crate::Result;

/// Error for an unrecognised file type name or extension.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported file type: {0}")]
pub struct UnknownFileType(pub String);

/// The office formats that may be uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    /// Word document.
    Docx,
    /// Excel workbook.
    Xlsx,
    /// PowerPoint presentation.
    Pptx,
}

impl FileType {
    /// All uploadable types.
    pub const ALL: [FileType; 3] = [FileType::Docx, FileType::Xlsx, FileType::Pptx];

    /// Stored name (`DOCX`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Docx => "DOCX",
            FileType::Xlsx => "XLSX",
            FileType::Pptx => "PPTX",
        }
    }

    /// Lower-case extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Docx => "docx",
            FileType::Xlsx => "xlsx",
            FileType::Pptx => "pptx",
        }
    }

    /// MIME type served on download.
    pub fn content_type(&self) -> &'static str {
        match self {
            FileType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileType::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            FileType::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
        }
    }

    /// Classify a filename by its extension (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use sharegate::file::FileType;
    ///
    /// assert_eq!(FileType::from_filename("Q3 Report.XLSX").unwrap(), FileType::Xlsx);
    /// assert!(FileType::from_filename("notes.txt").is_err());
    /// assert!(FileType::from_filename("docx").is_err());
    /// ```
    pub fn from_filename(name: &str) -> std::result::Result<Self, UnknownFileType> {
        let ext = std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| UnknownFileType(name.to_string()))?;

        Self::ALL
            .into_iter()
            .find(|t| t.extension() == ext)
            .ok_or_else(|| UnknownFileType(format!(".{ext}")))
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = UnknownFileType;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownFileType(s.to_string()))
    }
}

impl TryFrom<String> for FileType {
    type Error = UnknownFileType;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Metadata for an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredFile {
    /// Unique file ID.
    pub id: i64,
    /// Uploader; never changes.
    pub owner_id: i64,
    /// Filename as uploaded.
    pub original_name: String,
    /// Declared office format.
    #[sqlx(try_from = "String")]
    pub declared_type: FileType,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Free-form description.
    pub description: Option<String>,
    /// Blob store reference.
    pub blob_ref: String,
    /// Upload timestamp.
    pub created_at: String,
}

impl StoredFile {
    /// MIME type for the declared format.
    pub fn content_type(&self) -> &'static str {
        self.declared_type.content_type()
    }
}

/// Data for a new file row.
#[derive(Debug, Clone)]
pub struct NewStoredFile {
    /// Uploader.
    pub owner_id: i64,
    /// Filename as uploaded.
    pub original_name: String,
    /// Declared office format.
    pub declared_type: FileType,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Free-form description.
    pub description: Option<String>,
    /// Blob reference returned by the store.
    pub blob_ref: String,
}

/// Filters and paging for file listings.
#[derive(Debug, Clone, Default)]
pub struct FileQuery {
    /// Case-insensitive substring of name or description.
    pub q: Option<String>,
    /// Restrict to one format.
    pub file_type: Option<FileType>,
    /// Rows to skip.
    pub offset: i64,
    /// Rows to return.
    pub limit: i64,
}

const FILE_COLUMNS: &str =
    "f.id, f.owner_id, f.original_name, f.declared_type, f.size_bytes, f.description, f.blob_ref, f.created_at";

/// Repository for file metadata.
pub struct FileRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FileRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a file row.
    pub async fn create(&self, new_file: &NewStoredFile) -> Result<StoredFile> {
        let file = sqlx::query_as::<_, StoredFile>(
            "INSERT INTO files (owner_id, original_name, declared_type, size_bytes, description, blob_ref, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id, owner_id, original_name, declared_type, size_bytes, description, blob_ref, created_at",
        )
        .bind(new_file.owner_id)
        .bind(&new_file.original_name)
        .bind(new_file.declared_type.as_str())
        .bind(new_file.size_bytes)
        .bind(&new_file.description)
        .bind(&new_file.blob_ref)
        .bind(now_db())
        .fetch_one(self.pool)
        .await?;
        Ok(file)
    }

    /// Get a file by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<StoredFile>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files f WHERE f.id = ?");
        let file = sqlx::query_as::<_, StoredFile>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(file)
    }

    /// Delete a file row. Its share links go with it.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, owner_id: Option<i64>, query: &FileQuery) {
        builder.push(" WHERE 1 = 1");
        if let Some(owner_id) = owner_id {
            builder.push(" AND f.owner_id = ").push_bind(owner_id);
        }
        if let Some(file_type) = query.file_type {
            builder
                .push(" AND f.declared_type = ")
                .push_bind(file_type.as_str());
        }
        if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", q.to_lowercase());
            builder
                .push(" AND (LOWER(f.original_name) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(COALESCE(f.description, '')) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }

    /// List files, newest first. `owner_id` restricts to one uploader.
    pub async fn list(&self, owner_id: Option<i64>, query: &FileQuery) -> Result<Vec<StoredFile>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {FILE_COLUMNS} FROM files f"));
        Self::push_filters(&mut builder, owner_id, query);
        builder
            .push(" ORDER BY f.created_at DESC, f.id DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let files = builder
            .build_query_as::<StoredFile>()
            .fetch_all(self.pool)
            .await?;
        Ok(files)
    }

    /// Count what [`FileRepository::list`] would return without paging.
    pub async fn count(&self, owner_id: Option<i64>, query: &FileQuery) -> Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM files f");
        Self::push_filters(&mut builder, owner_id, query);

        let count: i64 = builder.build_query_scalar().fetch_one(self.pool).await?;
        Ok(count)
    }

    /// Files with at least one usable link, newest first.
    ///
    /// A link is usable while it is active, not past its expiry and below its
    /// download limit.
    pub async fn list_shared(&self, offset: i64, limit: i64) -> Result<Vec<StoredFile>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files f
             WHERE EXISTS (
                 SELECT 1 FROM share_links l
                 WHERE l.file_id = f.id
                   AND l.is_active = 1
                   AND (l.expires_at IS NULL OR l.expires_at >= ?)
                   AND (l.max_downloads IS NULL OR l.download_count < l.max_downloads)
             )
             ORDER BY f.created_at DESC, f.id DESC
             LIMIT ? OFFSET ?"
        );
        let files = sqlx::query_as::<_, StoredFile>(&sql)
            .bind(now_db())
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;
        Ok(files)
    }

    /// Count of files [`FileRepository::list_shared`] can return.
    pub async fn count_shared(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files f
             WHERE EXISTS (
                 SELECT 1 FROM share_links l
                 WHERE l.file_id = f.id
                   AND l.is_active = 1
                   AND (l.expires_at IS NULL OR l.expires_at >= ?)
                   AND (l.max_downloads IS NULL OR l.download_count < l.max_downloads)
             )",
        )
        .bind(now_db())
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

/// Overwrite a file's upload time. Test helper for ordering checks.
#[cfg(test)]
pub(crate) async fn set_created_at(
    pool: &DbPool,
    id: i64,
    at: &chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    sqlx::query("UPDATE files SET created_at = ? WHERE id = ?")
        .bind(crate::datetime::to_db(at))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

//! File registry service.
//!
//! Ties the blob store and the metadata table together and applies the
//! access gate. A file row exists only while its blob does:
//! - register writes the blob first and removes it again if the row insert fails
//! - delete retires links, then the blob, then the row

use tracing::{error, info, warn};

use super::metadata::{FileQuery, FileRepository, FileType, NewStoredFile, StoredFile};
use super::storage::BlobStore;
use super::{PaginatedResult, MAX_DESCRIPTION_LENGTH, MAX_FILENAME_LENGTH};
use crate::auth::{authorize_manage_file, authorize_upload, Requester};
use crate::db::{User, UserRepository};
use crate::notify::{templates, NotificationQueue};
use crate::share::ShareLinkRepository;
use crate::{Database, Result, SharegateError};

/// Default page size for listings.
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Largest page size a caller may ask for.
pub const MAX_PER_PAGE: u32 = 100;

/// Listing parameters as they arrive from a caller.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    /// Search text.
    pub q: Option<String>,
    /// Restrict to one format.
    pub file_type: Option<FileType>,
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
}

impl ListParams {
    /// Effective (page, per_page) after defaults and clamping.
    pub fn paging(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        (page, per_page)
    }

    fn to_query(&self) -> FileQuery {
        let (page, per_page) = self.paging();
        FileQuery {
            q: self.q.clone(),
            file_type: self.file_type,
            offset: i64::from(page - 1) * i64::from(per_page),
            limit: i64::from(per_page),
        }
    }
}

/// Who hears about new uploads.
#[derive(Debug, Clone)]
pub struct UploadNotifier<'a> {
    queue: &'a NotificationQueue,
    recipients: &'a [String],
}

impl<'a> UploadNotifier<'a> {
    /// Notify `recipients`; an empty list means every operations user.
    pub fn new(queue: &'a NotificationQueue, recipients: &'a [String]) -> Self {
        Self { queue, recipients }
    }
}

/// Service for file registration, lookup and deletion.
pub struct FileService<'a> {
    db: &'a Database,
    blobs: &'a dyn BlobStore,
    max_upload_bytes: u64,
    notifier: Option<UploadNotifier<'a>>,
}

impl<'a> FileService<'a> {
    /// Create a new FileService.
    pub fn new(db: &'a Database, blobs: &'a dyn BlobStore, max_upload_bytes: u64) -> Self {
        Self {
            db,
            blobs,
            max_upload_bytes,
            notifier: None,
        }
    }

    /// Queue upload notifications through `notifier`.
    pub fn with_notifier(mut self, notifier: UploadNotifier<'a>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn validate_upload(
        &self,
        original_name: &str,
        content: &[u8],
        description: Option<&str>,
    ) -> Result<FileType> {
        if original_name.trim().is_empty() {
            return Err(SharegateError::Validation("filename is required".to_string()));
        }
        if original_name.chars().count() > MAX_FILENAME_LENGTH {
            return Err(SharegateError::Validation(format!(
                "filename must be at most {MAX_FILENAME_LENGTH} characters"
            )));
        }
        if original_name.contains(['/', '\\', '\0']) || original_name.chars().any(char::is_control) {
            return Err(SharegateError::Validation(
                "filename contains invalid characters".to_string(),
            ));
        }
        let file_type = FileType::from_filename(original_name).map_err(|_| {
            SharegateError::Validation("Only .docx, .xlsx, and .pptx files are allowed".to_string())
        })?;

        if content.is_empty() {
            return Err(SharegateError::Validation("file is empty".to_string()));
        }
        if content.len() as u64 > self.max_upload_bytes {
            return Err(SharegateError::Validation(format!(
                "file exceeds the maximum size of {} MB",
                self.max_upload_bytes / (1024 * 1024)
            )));
        }
        if let Some(description) = description {
            if description.chars().count() > MAX_DESCRIPTION_LENGTH {
                return Err(SharegateError::Validation(format!(
                    "description must be at most {MAX_DESCRIPTION_LENGTH} characters"
                )));
            }
        }
        Ok(file_type)
    }

    /// Register an upload: blob first, then the metadata row.
    pub async fn register(
        &self,
        uploader: &User,
        original_name: &str,
        content: &[u8],
        description: Option<String>,
    ) -> Result<StoredFile> {
        authorize_upload(Requester::from(uploader))?;

        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let declared_type = self.validate_upload(original_name, content, description.as_deref())?;

        let blob_ref = self.blobs.put(content, original_name).await.map_err(|e| {
            error!(
                user_id = uploader.id,
                operation = "upload",
                filename = %original_name,
                "Blob write failed: {}",
                e
            );
            SharegateError::Storage("could not store file".to_string())
        })?;

        let new_file = NewStoredFile {
            owner_id: uploader.id,
            original_name: original_name.to_string(),
            declared_type,
            size_bytes: content.len() as i64,
            description,
            blob_ref: blob_ref.clone(),
        };

        let file = match FileRepository::new(self.db.pool()).create(&new_file).await {
            Ok(file) => file,
            Err(e) => {
                error!(
                    user_id = uploader.id,
                    operation = "upload",
                    blob_ref = %blob_ref,
                    "Metadata write failed, removing blob: {}",
                    e
                );
                if let Err(cleanup) = self.blobs.delete(&blob_ref).await {
                    error!(
                        user_id = uploader.id,
                        operation = "upload_rollback",
                        blob_ref = %blob_ref,
                        "Orphaned blob left behind: {}",
                        cleanup
                    );
                }
                return Err(SharegateError::Storage("could not record file".to_string()));
            }
        };

        info!(
            file_id = file.id,
            user_id = uploader.id,
            size = file.size_bytes,
            file_type = %file.declared_type,
            "File uploaded"
        );

        self.notify_upload(&file, uploader).await;
        Ok(file)
    }

    async fn notify_upload(&self, file: &StoredFile, uploader: &User) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if !notifier.queue.is_enabled() {
            return;
        }

        let recipients = if notifier.recipients.is_empty() {
            match UserRepository::new(self.db.pool()).operations_emails().await {
                Ok(emails) => emails,
                Err(e) => {
                    warn!(file_id = file.id, "Could not resolve upload recipients: {}", e);
                    return;
                }
            }
        } else {
            notifier.recipients.to_vec()
        };

        notifier
            .queue
            .enqueue(templates::upload_notification(file, uploader, recipients));
    }

    /// Fetch a file the requester may manage.
    pub async fn get(&self, id: i64, requester: Requester) -> Result<StoredFile> {
        let file = FileRepository::new(self.db.pool())
            .get_by_id(id)
            .await?
            .ok_or_else(|| SharegateError::NotFound("file".to_string()))?;

        authorize_manage_file(requester, file.owner_id)?;
        Ok(file)
    }

    /// List files visible to the requester.
    ///
    /// Operations users see every file; everyone else only their own uploads.
    pub async fn list(
        &self,
        requester: Requester,
        params: &ListParams,
    ) -> Result<PaginatedResult<StoredFile>> {
        let owner = if requester.role.is_elevated() {
            None
        } else {
            Some(requester.id)
        };
        let query = params.to_query();
        let repo = FileRepository::new(self.db.pool());

        let items = repo.list(owner, &query).await?;
        let total = repo.count(owner, &query).await?;
        let (page, per_page) = params.paging();

        Ok(PaginatedResult {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Files currently reachable through at least one usable share link.
    pub async fn list_shared(&self, params: &ListParams) -> Result<PaginatedResult<StoredFile>> {
        let query = params.to_query();
        let repo = FileRepository::new(self.db.pool());

        let items = repo.list_shared(query.offset, query.limit).await?;
        let total = repo.count_shared().await?;
        let (page, per_page) = params.paging();

        Ok(PaginatedResult {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Delete a file, its share links and its blob.
    pub async fn delete(&self, id: i64, requester: Requester) -> Result<()> {
        let file = self.get(id, requester).await?;

        let removed_links = ShareLinkRepository::new(self.db.pool())
            .delete_for_file(file.id)
            .await?;

        if let Err(e) = self.blobs.delete(&file.blob_ref).await {
            error!(
                file_id = file.id,
                user_id = requester.id,
                operation = "delete",
                blob_ref = %file.blob_ref,
                "Blob delete failed, file kept: {}",
                e
            );
            return Err(SharegateError::Storage("could not delete file content".to_string()));
        }

        if let Err(e) = FileRepository::new(self.db.pool()).delete(file.id).await {
            error!(
                file_id = file.id,
                user_id = requester.id,
                operation = "delete",
                blob_ref = %file.blob_ref,
                "Blob removed but metadata row remains: {}",
                e
            );
            return Err(SharegateError::Storage("could not delete file record".to_string()));
        }

        info!(
            file_id = file.id,
            user_id = requester.id,
            removed_links,
            "File deleted"
        );
        Ok(())
    }

    /// Read a file's content.
    pub async fn read_content(&self, file: &StoredFile) -> Result<Vec<u8>> {
        self.blobs.get(&file.blob_ref).await.map_err(|e| match e {
            SharegateError::NotFound(_) => {
                error!(file_id = file.id, blob_ref = %file.blob_ref, "Blob missing for file");
                SharegateError::NotFound("file".to_string())
            }
            other => {
                error!(file_id = file.id, blob_ref = %file.blob_ref, "Blob read failed: {}", other);
                SharegateError::Storage("could not read file".to_string())
            }
        })
    }
}

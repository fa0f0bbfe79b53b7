//! File management module for sharegate.
//!
//! This module provides upload/download plumbing including:
//! - Blob storage with UUID naming (disk and in-memory)
//! - File metadata management
//! - The file registry service with permission checks

mod metadata;
mod service;
mod storage;

pub use metadata::{
    FileQuery, FileRepository, FileType, NewStoredFile, StoredFile, UnknownFileType,
};
pub use service::{FileService, ListParams, UploadNotifier, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use storage::{generate_blob_ref, BlobStore, FileStorage, MemoryBlobStore};

/// Maximum length for an uploaded filename (in characters).
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Maximum length for a file description (in characters).
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Total number of items (across all pages).
    pub total: i64,
    /// 1-based page number.
    pub page: u32,
    /// Page size used for this query.
    pub per_page: u32,
}

impl<T> PaginatedResult<T> {
    /// Check if there are more items after this page.
    pub fn has_more(&self) -> bool {
        i64::from(self.page) * i64::from(self.per_page) < self.total
    }
}

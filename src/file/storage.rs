//! Blob storage for sharegate.
//!
//! Uploaded bytes live outside the database and are addressed by an opaque
//! blob reference. [`FileStorage`] keeps them on disk:
//! - UUID-based file naming
//! - Directory sharding by first 2 characters of UUID
//! - Put, get, and delete operations
//!
//! [`MemoryBlobStore`] keeps them in memory and can be told to fail, which the
//! registry tests use to exercise compensation paths.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{Result, SharegateError};

/// Storage backend for uploaded content.
pub trait BlobStore: Send + Sync {
    /// Store `content` and return its new blob reference.
    fn put<'a>(&'a self, content: &'a [u8], original_name: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Read the content behind a blob reference.
    fn get<'a>(&'a self, blob_ref: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;

    /// Remove a blob. Returns `false` if it was already gone.
    fn delete<'a>(&'a self, blob_ref: &'a str) -> BoxFuture<'a, Result<bool>>;
}

/// Generate a new UUID-based blob reference keeping the original extension.
pub fn generate_blob_ref(original_name: &str) -> String {
    let ext = extract_extension(original_name).to_ascii_lowercase();
    format!("{}.{ext}", Uuid::new_v4())
}

/// Extension of `filename`, or `bin` if there is none.
fn extract_extension(filename: &str) -> &str {
    Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("bin")
}

/// Disk-backed blob store.
///
/// Files are stored in a sharded directory structure:
/// ```text
/// {base_path}/
/// ├── ab/
/// │   └── ab12cd34-5678-90ab-cdef-123456789012.docx
/// ├── cd/
/// │   └── cd90ab12-3456-7890-abcd-ef1234567890.xlsx
/// └── ...
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage with the given base path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Full path for a blob reference: `{base_path}/{shard}/{blob_ref}`.
    pub fn get_file_path(&self, blob_ref: &str) -> Result<PathBuf> {
        if blob_ref.is_empty()
            || blob_ref.contains(['/', '\\'])
            || blob_ref.starts_with('.')
        {
            return Err(SharegateError::Storage(format!(
                "malformed blob reference {blob_ref:?}"
            )));
        }
        Ok(self.base_path.join(Self::get_shard(blob_ref)).join(blob_ref))
    }

    fn get_shard(blob_ref: &str) -> &str {
        match blob_ref.char_indices().nth(2) {
            Some((idx, _)) => &blob_ref[..idx],
            None => blob_ref,
        }
    }

    async fn write_blob(&self, content: &[u8], blob_ref: &str) -> Result<()> {
        let path = self.get_file_path(blob_ref)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}

impl BlobStore for FileStorage {
    fn put<'a>(&'a self, content: &'a [u8], original_name: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let blob_ref = generate_blob_ref(original_name);
            self.write_blob(content, &blob_ref).await?;
            Ok(blob_ref)
        })
    }

    fn get<'a>(&'a self, blob_ref: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let path = self.get_file_path(blob_ref)?;
            match tokio::fs::read(&path).await {
                Ok(content) => Ok(content),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(SharegateError::NotFound("file content".to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn delete<'a>(&'a self, blob_ref: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let path = self.get_file_path(blob_ref)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// In-memory blob store with switchable failures.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail (or succeed again).
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete` fail (or succeed again).
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of blobs held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a blob exists.
    pub fn contains(&self, blob_ref: &str) -> bool {
        self.lock().contains_key(blob_ref)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn injected(operation: &str) -> SharegateError {
        SharegateError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("injected {operation} failure"),
        ))
    }
}

impl BlobStore for MemoryBlobStore {
    fn put<'a>(&'a self, content: &'a [u8], original_name: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(Self::injected("put"));
            }
            let blob_ref = generate_blob_ref(original_name);
            self.lock().insert(blob_ref.clone(), content.to_vec());
            Ok(blob_ref)
        })
    }

    fn get<'a>(&'a self, blob_ref: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            self.lock()
                .get(blob_ref)
                .cloned()
                .ok_or_else(|| SharegateError::NotFound("file content".to_string()))
        })
    }

    fn delete<'a>(&'a self, blob_ref: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(Self::injected("delete"));
            }
            Ok(self.lock().remove(blob_ref).is_some())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_storage() -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path()).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_new_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage_path = temp_dir.path().join("storage");

        assert!(!storage_path.exists());

        let storage = FileStorage::new(&storage_path).unwrap();

        assert!(storage_path.exists());
        assert_eq!(storage.base_path(), storage_path);
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (_temp_dir, storage) = setup_storage();
        let content = b"PK\x03\x04 spreadsheet";

        let blob_ref = storage.put(content, "report.XLSX").await.unwrap();
        assert!(blob_ref.ends_with(".xlsx"));

        let loaded = storage.get(&blob_ref).await.unwrap();
        assert_eq!(loaded, content);

        let shard_dir = storage.base_path().join(&blob_ref[..2]);
        assert!(shard_dir.is_dir());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_temp_dir, storage) = setup_storage();
        let result = storage.get("ab000000-0000-0000-0000-000000000000.docx").await;
        assert!(matches!(result, Err(SharegateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_temp_dir, storage) = setup_storage();

        let blob_ref = storage.put(b"to delete", "slides.pptx").await.unwrap();
        assert!(storage.delete(&blob_ref).await.unwrap());
        assert!(!storage.delete(&blob_ref).await.unwrap());
        assert!(storage.get(&blob_ref).await.is_err());
    }

    #[test]
    fn test_get_file_path() {
        let (_temp_dir, storage) = setup_storage();

        let blob_ref = "ab12cd34-5678-90ab-cdef-123456789012.docx";
        let path = storage.get_file_path(blob_ref).unwrap();

        assert_eq!(path, storage.base_path().join("ab").join(blob_ref));
    }

    #[test]
    fn test_get_file_path_rejects_traversal() {
        let (_temp_dir, storage) = setup_storage();
        assert!(storage.get_file_path("../etc/passwd").is_err());
        assert!(storage.get_file_path("ab/cd.docx").is_err());
        assert!(storage.get_file_path("").is_err());
    }

    #[test]
    fn test_generate_blob_ref() {
        let a = generate_blob_ref("a.docx");
        let b = generate_blob_ref("a.docx");
        assert_ne!(a, b);
        assert!(a.ends_with(".docx"));
        assert!(generate_blob_ref("no_extension").ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_memory_store_fault_injection() {
        let store = MemoryBlobStore::new();

        let blob_ref = store.put(b"data", "a.docx").await.unwrap();
        assert!(store.contains(&blob_ref));

        store.set_fail_deletes(true);
        assert!(store.delete(&blob_ref).await.is_err());
        assert_eq!(store.len(), 1);

        store.set_fail_deletes(false);
        assert!(store.delete(&blob_ref).await.unwrap());
        assert!(store.is_empty());

        store.set_fail_puts(true);
        assert!(store.put(b"data", "b.docx").await.is_err());
        assert!(store.is_empty());
    }
}

//! Share link entity and repository.

use super::Denial;
use crate::datetime::now_db;
use crate::db::DbPool;
use crate::{Result, SharegateError};

const LINK_COLUMNS: &str = "id, token, file_id, created_by, created_at, expires_at, max_downloads, download_count, is_active";

/// A share link row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ShareLink {
    /// Link ID.
    pub id: i64,
    /// Bearer token.
    pub token: String,
    /// File the link grants access to.
    pub file_id: i64,
    /// User who issued the link.
    pub created_by: i64,
    /// Issue timestamp.
    pub created_at: String,
    /// Expiry timestamp; `None` never expires on time.
    pub expires_at: Option<String>,
    /// Download ceiling; `None` is unlimited.
    pub max_downloads: Option<i64>,
    /// Successful downloads so far.
    pub download_count: i64,
    /// Kill switch. Once false, stays false.
    pub is_active: bool,
}

impl ShareLink {
    /// Why a consume at `now` would be refused, checked in order:
    /// deactivated, expired, limit reached.
    ///
    /// `now` is a storage-format timestamp; the fixed-width format makes
    /// string comparison chronological.
    pub fn denial_at(&self, now: &str) -> Option<Denial> {
        if !self.is_active {
            return Some(Denial::Deactivated);
        }
        if self.is_expired_at(now) {
            return Some(Denial::Expired);
        }
        if self.is_exhausted() {
            return Some(Denial::LimitReached);
        }
        None
    }

    /// Past its expiry at `now`.
    pub fn is_expired_at(&self, now: &str) -> bool {
        matches!(&self.expires_at, Some(expires_at) if now > expires_at.as_str())
    }

    /// No downloads left.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.max_downloads, Some(max) if self.download_count >= max)
    }

    /// Downloads left, if limited.
    pub fn remaining_downloads(&self) -> Option<i64> {
        self.max_downloads
            .map(|max| (max - self.download_count).max(0))
    }
}

/// Data for a new link.
#[derive(Debug, Clone)]
pub struct NewShareLink {
    /// Bearer token.
    pub token: String,
    /// Target file.
    pub file_id: i64,
    /// Issuer.
    pub created_by: i64,
    /// Expiry in storage format.
    pub expires_at: Option<String>,
    /// Download ceiling.
    pub max_downloads: Option<i64>,
}

/// Repository for share links.
pub struct ShareLinkRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ShareLinkRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a link. A token collision yields [`SharegateError::Conflict`].
    pub async fn create(&self, new_link: &NewShareLink) -> Result<ShareLink> {
        let sql = format!(
            "INSERT INTO share_links (token, file_id, created_by, created_at, expires_at, max_downloads, download_count, is_active)
             VALUES (?, ?, ?, ?, ?, ?, 0, 1)
             RETURNING {LINK_COLUMNS}"
        );
        sqlx::query_as::<_, ShareLink>(&sql)
            .bind(&new_link.token)
            .bind(new_link.file_id)
            .bind(new_link.created_by)
            .bind(now_db())
            .bind(&new_link.expires_at)
            .bind(new_link.max_downloads)
            .fetch_one(self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    SharegateError::Conflict("share token already in use".to_string())
                }
                _ => SharegateError::Database(e.to_string()),
            })
    }

    /// Get a link by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<ShareLink>> {
        let sql = format!("SELECT {LINK_COLUMNS} FROM share_links WHERE id = ?");
        let link = sqlx::query_as::<_, ShareLink>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(link)
    }

    /// Get a link by token.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<ShareLink>> {
        let sql = format!("SELECT {LINK_COLUMNS} FROM share_links WHERE token = ?");
        let link = sqlx::query_as::<_, ShareLink>(&sql)
            .bind(token)
            .fetch_optional(self.pool)
            .await?;
        Ok(link)
    }

    /// Take one download slot if the link is still usable at `now`.
    ///
    /// The checks and the increment are a single statement, so concurrent
    /// callers cannot overrun `max_downloads`. `None` means nothing was
    /// updated and the caller should re-read the link.
    pub async fn try_consume(&self, id: i64, now: &str) -> Result<Option<ShareLink>> {
        let sql = format!(
            "UPDATE share_links SET download_count = download_count + 1
             WHERE id = ?
               AND is_active = 1
               AND (expires_at IS NULL OR expires_at >= ?)
               AND (max_downloads IS NULL OR download_count < max_downloads)
             RETURNING {LINK_COLUMNS}"
        );
        let link = sqlx::query_as::<_, ShareLink>(&sql)
            .bind(id)
            .bind(now)
            .fetch_optional(self.pool)
            .await?;
        Ok(link)
    }

    /// Switch a link off. Idempotent.
    pub async fn deactivate(&self, id: i64) -> Result<Option<ShareLink>> {
        let sql = format!("UPDATE share_links SET is_active = 0 WHERE id = ? RETURNING {LINK_COLUMNS}");
        let link = sqlx::query_as::<_, ShareLink>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(link)
    }

    /// Replace a link's expiry.
    pub async fn set_expires_at(&self, id: i64, expires_at: &str) -> Result<Option<ShareLink>> {
        let sql = format!("UPDATE share_links SET expires_at = ? WHERE id = ? RETURNING {LINK_COLUMNS}");
        let link = sqlx::query_as::<_, ShareLink>(&sql)
            .bind(expires_at)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(link)
    }

    /// Remove every link of a file.
    pub async fn delete_for_file(&self, file_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM share_links WHERE file_id = ?")
            .bind(file_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Links issued by `created_by` (or all links), newest first.
    pub async fn list(&self, created_by: Option<i64>) -> Result<Vec<ShareLink>> {
        let links = match created_by {
            Some(user_id) => {
                let sql = format!(
                    "SELECT {LINK_COLUMNS} FROM share_links WHERE created_by = ?
                     ORDER BY created_at DESC, id DESC"
                );
                sqlx::query_as::<_, ShareLink>(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {LINK_COLUMNS} FROM share_links ORDER BY created_at DESC, id DESC"
                );
                sqlx::query_as::<_, ShareLink>(&sql)
                    .fetch_all(self.pool)
                    .await?
            }
        };
        Ok(links)
    }

    /// Links of one file, newest first.
    pub async fn list_for_file(&self, file_id: i64) -> Result<Vec<ShareLink>> {
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM share_links WHERE file_id = ?
             ORDER BY created_at DESC, id DESC"
        );
        let links = sqlx::query_as::<_, ShareLink>(&sql)
            .bind(file_id)
            .fetch_all(self.pool)
            .await?;
        Ok(links)
    }
}

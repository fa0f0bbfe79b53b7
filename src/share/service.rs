//! Share-link engine: issue, consume, deactivate, extend.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use super::link::{NewShareLink, ShareLink, ShareLinkRepository};
use super::token::{OsTokenSource, TokenSource};
use super::{ConsumeOutcome, Denial};
use crate::auth::{authorize_manage_file, authorize_manage_link, Requester};
use crate::datetime::{from_db, now_db, to_db_checked};
use crate::file::{FileRepository, StoredFile};
use crate::{Database, Result, SharegateError};

/// Insert attempts before a token collision becomes fatal.
pub const MAX_ISSUE_ATTEMPTS: usize = 5;

/// Re-reads after a lost increment race before giving up.
const MAX_CONSUME_ROUNDS: usize = 8;

/// Parameters for a new link.
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueOptions {
    /// Lifetime; `None` means no time-based expiry.
    pub ttl: Option<Duration>,
    /// Download ceiling; `None` means unlimited.
    pub max_downloads: Option<i64>,
}

/// Share-link operations with permission checks.
pub struct ShareLinkService<'a> {
    db: &'a Database,
    tokens: Arc<dyn TokenSource>,
}

impl<'a> ShareLinkService<'a> {
    /// Create a new service drawing tokens from the OS RNG.
    pub fn new(db: &'a Database) -> Self {
        Self::with_token_source(db, Arc::new(OsTokenSource))
    }

    /// Create a new service with a custom token source.
    pub fn with_token_source(db: &'a Database, tokens: Arc<dyn TokenSource>) -> Self {
        Self { db, tokens }
    }

    async fn load_file(&self, file_id: i64) -> Result<StoredFile> {
        FileRepository::new(self.db.pool())
            .get_by_id(file_id)
            .await?
            .ok_or_else(|| SharegateError::NotFound("file".to_string()))
    }

    async fn load_link(&self, link_id: i64) -> Result<ShareLink> {
        ShareLinkRepository::new(self.db.pool())
            .get_by_id(link_id)
            .await?
            .ok_or_else(|| SharegateError::NotFound("share link".to_string()))
    }

    /// Issue a link for a file the requester may manage.
    pub async fn issue(
        &self,
        file_id: i64,
        requester: Requester,
        options: IssueOptions,
    ) -> Result<ShareLink> {
        if let Some(ttl) = options.ttl {
            if ttl <= Duration::zero() {
                return Err(SharegateError::Validation(
                    "expiry must be in the future".to_string(),
                ));
            }
        }
        if let Some(max) = options.max_downloads {
            if max < 1 {
                return Err(SharegateError::Validation(
                    "max_downloads must be at least 1".to_string(),
                ));
            }
        }

        let file = self.load_file(file_id).await?;
        authorize_manage_file(requester, file.owner_id)?;

        let expires_at = match options.ttl {
            Some(ttl) => {
                let at = Utc::now()
                    .checked_add_signed(ttl)
                    .ok_or_else(|| SharegateError::Validation("expiry is too far away".to_string()))?;
                Some(to_db_checked(&at)?)
            }
            None => None,
        };

        let repo = ShareLinkRepository::new(self.db.pool());
        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let new_link = NewShareLink {
                token: self.tokens.next_token(),
                file_id: file.id,
                created_by: requester.id,
                expires_at: expires_at.clone(),
                max_downloads: options.max_downloads,
            };

            match repo.create(&new_link).await {
                Ok(link) => {
                    info!(
                        link_id = link.id,
                        file_id = file.id,
                        user_id = requester.id,
                        expires_at = ?link.expires_at,
                        max_downloads = ?link.max_downloads,
                        "Share link issued"
                    );
                    return Ok(link);
                }
                Err(SharegateError::Conflict(_)) => {
                    warn!(file_id = file.id, attempt, "Share token collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        error!(
            file_id = file.id,
            user_id = requester.id,
            operation = "issue",
            "No unique share token after {} attempts",
            MAX_ISSUE_ATTEMPTS
        );
        Err(SharegateError::Storage(
            "could not allocate a unique share token".to_string(),
        ))
    }

    /// Check a token and take one download slot.
    ///
    /// Checks run in order: unknown token, deactivated, expired, limit
    /// reached. The slot is taken with a conditional update; if another
    /// request wins the race the link is re-read and classified again.
    pub async fn validate_and_consume(&self, token: &str) -> Result<ConsumeOutcome> {
        let repo = ShareLinkRepository::new(self.db.pool());

        let Some(mut link) = repo.get_by_token(token).await? else {
            debug!("Unknown share token presented");
            return Ok(ConsumeOutcome::Denied(Denial::NotFound));
        };

        for _ in 0..MAX_CONSUME_ROUNDS {
            let now = now_db();
            if let Some(denial) = link.denial_at(&now) {
                debug!(link_id = link.id, %denial, "Share link refused");
                return Ok(ConsumeOutcome::Denied(denial));
            }

            if let Some(consumed) = repo.try_consume(link.id, &now).await? {
                let Some(file) = FileRepository::new(self.db.pool())
                    .get_by_id(consumed.file_id)
                    .await?
                else {
                    // File deleted between lookup and increment.
                    return Ok(ConsumeOutcome::Denied(Denial::NotFound));
                };
                info!(
                    link_id = consumed.id,
                    file_id = file.id,
                    download_count = consumed.download_count,
                    "Share link consumed"
                );
                return Ok(ConsumeOutcome::Granted {
                    link: consumed,
                    file,
                });
            }

            match repo.get_by_id(link.id).await? {
                Some(fresh) => link = fresh,
                None => return Ok(ConsumeOutcome::Denied(Denial::NotFound)),
            }
        }

        error!(link_id = link.id, operation = "consume", "Share link kept changing under consume");
        Err(SharegateError::Storage("share link is busy".to_string()))
    }

    /// Switch a link off for good.
    pub async fn deactivate(&self, link_id: i64, requester: Requester) -> Result<ShareLink> {
        let link = self.load_link(link_id).await?;
        authorize_manage_link(requester, link.created_by)?;

        let updated = ShareLinkRepository::new(self.db.pool())
            .deactivate(link.id)
            .await?
            .ok_or_else(|| SharegateError::NotFound("share link".to_string()))?;

        info!(link_id = link.id, user_id = requester.id, "Share link deactivated");
        Ok(updated)
    }

    /// Push a link's expiry back by `additional`.
    ///
    /// A link without expiry gets one, counted from now.
    pub async fn extend(
        &self,
        link_id: i64,
        requester: Requester,
        additional: Duration,
    ) -> Result<ShareLink> {
        if additional <= Duration::zero() {
            return Err(SharegateError::Validation(
                "extension must be positive".to_string(),
            ));
        }

        let link = self.load_link(link_id).await?;
        authorize_manage_link(requester, link.created_by)?;

        let base = match &link.expires_at {
            Some(expires_at) => from_db(expires_at)?,
            None => Utc::now(),
        };
        let new_expiry = base
            .checked_add_signed(additional)
            .ok_or_else(|| SharegateError::Validation("expiry is too far away".to_string()))?;
        let new_expiry = to_db_checked(&new_expiry)?;

        let updated = ShareLinkRepository::new(self.db.pool())
            .set_expires_at(link.id, &new_expiry)
            .await?
            .ok_or_else(|| SharegateError::NotFound("share link".to_string()))?;

        info!(
            link_id = link.id,
            user_id = requester.id,
            expires_at = ?updated.expires_at,
            "Share link extended"
        );
        Ok(updated)
    }

    /// Fetch a link the requester may manage.
    pub async fn get(&self, link_id: i64, requester: Requester) -> Result<ShareLink> {
        let link = self.load_link(link_id).await?;
        authorize_manage_link(requester, link.created_by)?;
        Ok(link)
    }

    /// Links visible to the requester: all for operations, own otherwise.
    pub async fn list_for_user(&self, requester: Requester) -> Result<Vec<ShareLink>> {
        let creator = if requester.role.is_elevated() {
            None
        } else {
            Some(requester.id)
        };
        ShareLinkRepository::new(self.db.pool()).list(creator).await
    }

    /// Links of a file the requester may manage.
    pub async fn list_for_file(&self, file_id: i64, requester: Requester) -> Result<Vec<ShareLink>> {
        let file = self.load_file(file_id).await?;
        authorize_manage_file(requester, file.owner_id)?;
        ShareLinkRepository::new(self.db.pool())
            .list_for_file(file.id)
            .await
    }
}

//! API handlers for the sharegate HTTP surface.

pub mod auth;
pub mod file;
pub mod share;

pub use auth::*;
pub use file::*;
pub use share::*;

use std::sync::Arc;

use crate::auth::{IdentityService, JwtClaims, TokenKeys};
use crate::config::Config;
use crate::db::User;
use crate::file::BlobStore;
use crate::notify::NotificationQueue;
use crate::web::error::ApiError;
use crate::Database;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database pool.
    pub db: Arc<Database>,
    /// JWT signing material.
    pub keys: Arc<TokenKeys>,
    /// Blob store for file content.
    pub blobs: Arc<dyn BlobStore>,
    /// Outbound mail queue.
    pub notifications: NotificationQueue,
    /// Upload ceiling in bytes.
    pub max_upload_bytes: u64,
    /// Base URL used to build share URLs.
    pub public_base_url: String,
    /// Lifetime of links issued without one.
    pub default_ttl_days: u32,
    /// Frontend base URL used in verification mails.
    pub frontend_url: String,
    /// Staff notified on upload; empty means every operations user.
    pub upload_recipients: Vec<String>,
}

impl AppState {
    /// Build the state from loaded configuration.
    pub fn from_config(
        config: &Config,
        db: Arc<Database>,
        blobs: Arc<dyn BlobStore>,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            db,
            keys: Arc::new(TokenKeys::new(
                &config.web.jwt_secret,
                config.web.jwt_access_token_expiry_secs,
                config.web.jwt_refresh_token_expiry_days,
            )),
            blobs,
            notifications,
            max_upload_bytes: config.files.max_upload_bytes(),
            public_base_url: config.share.public_base_url.clone(),
            default_ttl_days: config.share.default_ttl_days,
            frontend_url: config.notifications.frontend_url.clone(),
            upload_recipients: config.notifications.upload_recipients.clone(),
        }
    }

    /// Identity service over this state.
    pub fn identity(&self) -> IdentityService<'_> {
        IdentityService::new(&self.db, &self.keys)
    }

    /// Load the live account behind verified claims.
    ///
    /// The stored role wins over the role baked into the token.
    pub async fn current_user(&self, claims: &JwtClaims) -> Result<User, ApiError> {
        self.identity()
            .current_user(Some(claims))
            .await?
            .ok_or_else(|| ApiError::unauthorized("Missing authorization"))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("public_base_url", &self.public_base_url)
            .field("default_ttl_days", &self.default_ttl_days)
            .finish_non_exhaustive()
    }
}

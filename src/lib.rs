//! sharegate - role-gated document sharing
//!
//! Operations staff upload office documents and hand clients bearer links
//! that expire, count their downloads, and can be switched off.

pub mod auth;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod notify;
pub mod share;
pub mod web;

pub use auth::{
    authorize_link_consumer, authorize_manage_file, authorize_manage_link, authorize_upload,
    hash_password, validate_password, verify_password, IdentityService, PasswordError,
    PermissionError, RegistrationRequest, RegistrationService, Requester, TokenKeys,
};
pub use config::Config;
pub use db::{Database, NewUser, Role, User, UserRepository};
pub use error::{Result, SharegateError};
pub use file::{BlobStore, FileService, FileStorage, FileType, MemoryBlobStore, StoredFile};
pub use notify::{LogMailer, Mailer, NotificationQueue};
pub use share::{ConsumeOutcome, Denial, IssueOptions, ShareLink, ShareLinkService};

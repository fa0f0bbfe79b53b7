//! Authentication and authorization for sharegate.
//!
//! This module provides password hashing, the role/ownership access gate,
//! registration with email verification, and JWT-backed sessions.

mod identity;
mod password;
pub mod permission;
mod registration;

pub use identity::{AuthTokens, IdentityService, JwtClaims, TokenKeys};
pub use password::{
    hash_password, hash_password_async, validate_password, verify_password,
    verify_password_async, PasswordError, MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH,
};
pub use permission::{
    authorize_link_consumer, authorize_manage_file, authorize_manage_link, authorize_upload,
    require_active, PermissionError, Requester,
};
pub use registration::{
    RegistrationRequest, RegistrationService, MAX_NAME_LENGTH, VERIFICATION_TOKEN_TTL_HOURS,
};

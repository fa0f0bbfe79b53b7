//! Request DTOs for Web API.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::validation::no_control_chars;

/// Login request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Email address.
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    /// Password.
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Logout request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// Refresh token to invalidate.
    pub refresh_token: String,
}

/// Token refresh request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// Refresh token.
    pub refresh_token: String,
}

/// User registration request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// Email address.
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    /// Password.
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    /// Given name.
    #[serde(default)]
    #[validate(
        length(max = 150, message = "First name must not exceed 150 characters"),
        custom(function = "no_control_chars")
    )]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    #[validate(
        length(max = 150, message = "Last name must not exceed 150 characters"),
        custom(function = "no_control_chars")
    )]
    pub last_name: Option<String>,
}

/// Email verification request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    /// Token from the verification mail.
    pub token: String,
}

/// Request for a fresh verification mail.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResendVerificationRequest {
    /// Email address of the account.
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Password change request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    /// Current password.
    pub current_password: String,
    /// New password.
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: String,
}

/// Multipart upload form, for the API documentation.
#[derive(Debug, ToSchema)]
pub struct UploadForm {
    /// The .docx, .xlsx or .pptx file.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Optional description (max 500 characters).
    pub description: Option<String>,
}

/// Query parameters for file listings.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileListQuery {
    /// Case-insensitive search in name and description.
    pub q: Option<String>,
    /// DOCX, XLSX or PPTX.
    pub file_type: Option<String>,
    /// Page number (1-based).
    pub page: Option<u32>,
    /// Items per page (max 100).
    pub per_page: Option<u32>,
}

/// Share link issuance request.
///
/// With no lifetime field the configured default applies; `no_expiry`
/// issues a link that never expires.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ShareRequest {
    /// Lifetime in days.
    #[validate(range(min = 1, max = 3650, message = "expires_in_days must be 1-3650"))]
    pub expires_in_days: Option<i64>,
    /// Lifetime in seconds (at most ten years); takes precedence over
    /// `expires_in_days`.
    #[validate(range(
        min = 1,
        max = 315_360_000,
        message = "ttl_seconds must be 1-315360000"
    ))]
    pub ttl_seconds: Option<i64>,
    /// Download ceiling; omitted means unlimited.
    #[validate(range(min = 1, message = "max_downloads must be at least 1"))]
    pub max_downloads: Option<i64>,
    /// Issue without any expiry.
    #[serde(default)]
    pub no_expiry: bool,
}

/// Share link extension request.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ExtendRequest {
    /// Days to add; defaults to 7.
    #[validate(range(min = 1, max = 3650, message = "days must be 1-3650"))]
    pub days: Option<i64>,
}

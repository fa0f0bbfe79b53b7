//! Response DTOs for Web API.

use serde::Serialize;
use utoipa::ToSchema;

use crate::datetime::to_rfc3339;
use crate::db::User;
use crate::file::{FileType, PaginatedResult, StoredFile};
use crate::share::ShareLink;

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    /// Response data.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub meta: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    /// Create a new paginated response.
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        Self {
            data,
            meta: PaginationMeta {
                page,
                per_page,
                total,
            },
        }
    }

    /// Convert a service page, mapping every item.
    pub fn from_page<S>(page: PaginatedResult<S>, f: impl FnMut(S) -> T) -> Self {
        let total = u64::try_from(page.total).unwrap_or(0);
        Self::new(
            page.items.into_iter().map(f).collect(),
            page.page,
            page.per_page,
            total,
        )
    }
}

/// Pagination metadata.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u64,
}

// ============================================================================
// Auth DTOs
// ============================================================================

/// User information in responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserInfo {
    /// User ID.
    pub id: i64,
    /// Email address.
    pub email: String,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// CLIENT or OPERATIONS.
    pub role: String,
    /// Whether the address has been verified.
    pub is_verified: bool,
    /// Account creation timestamp.
    pub created_at: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role.as_str().to_string(),
            is_verified: user.is_verified,
            created_at: to_rfc3339(&user.created_at),
        }
    }
}

/// Login response.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Access token (JWT).
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Access token expiry in seconds.
    pub expires_in: u64,
    /// User information.
    pub user: UserInfo,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    /// What happened.
    pub message: String,
}

impl MessageResponse {
    /// Create a new message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// File DTOs
// ============================================================================

/// File metadata response.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileResponse {
    /// File ID.
    pub id: i64,
    /// Uploader ID.
    pub owner_id: i64,
    /// Original filename.
    pub name: String,
    /// Declared office format.
    pub file_type: FileType,
    /// MIME type served on download.
    pub content_type: String,
    /// Size in bytes.
    pub size: i64,
    /// Description.
    pub description: Option<String>,
    /// Upload timestamp.
    pub created_at: String,
}

impl From<StoredFile> for FileResponse {
    fn from(file: StoredFile) -> Self {
        Self {
            id: file.id,
            owner_id: file.owner_id,
            content_type: file.content_type().to_string(),
            name: file.original_name,
            file_type: file.declared_type,
            size: file.size_bytes,
            description: file.description,
            created_at: to_rfc3339(&file.created_at),
        }
    }
}

// ============================================================================
// Share DTOs
// ============================================================================

/// Share link response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShareLinkResponse {
    /// Link ID.
    pub id: i64,
    /// Bearer token.
    pub token: String,
    /// Public download URL.
    pub share_url: String,
    /// File the link grants.
    pub file_id: i64,
    /// Issuer.
    pub created_by: i64,
    /// Issue timestamp.
    pub created_at: String,
    /// Expiry, if any.
    pub expires_at: Option<String>,
    /// Download ceiling, if any.
    pub max_downloads: Option<i64>,
    /// Downloads served so far.
    pub download_count: i64,
    /// Downloads left, if limited.
    pub remaining_downloads: Option<i64>,
    /// Whether the link is switched on.
    pub is_active: bool,
}

impl ShareLinkResponse {
    /// Build a response, deriving the public URL from `public_base_url`.
    pub fn from_link(link: ShareLink, public_base_url: &str) -> Self {
        Self {
            share_url: share_url(public_base_url, &link.token),
            remaining_downloads: link.remaining_downloads(),
            id: link.id,
            token: link.token,
            file_id: link.file_id,
            created_by: link.created_by,
            created_at: to_rfc3339(&link.created_at),
            expires_at: link.expires_at.as_deref().map(to_rfc3339),
            max_downloads: link.max_downloads,
            download_count: link.download_count,
            is_active: link.is_active,
        }
    }
}

/// Public download URL for a token.
pub fn share_url(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/api/share/{}/download",
        public_base_url.trim_end_matches('/'),
        token
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_url_trims_trailing_slash() {
        assert_eq!(
            share_url("https://files.example.com/", "abc"),
            "https://files.example.com/api/share/abc/download"
        );
        assert_eq!(
            share_url("http://localhost:8080", "abc"),
            "http://localhost:8080/api/share/abc/download"
        );
    }

    #[test]
    fn test_paginated_from_page() {
        let page = PaginatedResult {
            items: vec![1, 2, 3],
            total: 13,
            page: 2,
            per_page: 3,
        };
        let resp = PaginatedResponse::from_page(page, |n: i32| n * 10);
        assert_eq!(resp.data, vec![10, 20, 30]);
        assert_eq!(resp.meta.total, 13);
        assert_eq!(resp.meta.page, 2);
    }

    #[test]
    fn test_share_link_response_counts() {
        let link = ShareLink {
            id: 4,
            token: "tok".to_string(),
            file_id: 9,
            created_by: 1,
            created_at: "2024-01-15 10:30:00.000000".to_string(),
            expires_at: Some("2024-01-22 10:30:00.000000".to_string()),
            max_downloads: Some(3),
            download_count: 1,
            is_active: true,
        };
        let resp = ShareLinkResponse::from_link(link, "http://host");
        assert_eq!(resp.remaining_downloads, Some(2));
        assert_eq!(resp.expires_at.as_deref(), Some("2024-01-22T10:30:00Z"));
        assert_eq!(resp.share_url, "http://host/api/share/tok/download");
    }
}

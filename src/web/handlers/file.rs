//! File handlers for Web API.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Duration;
use std::sync::Arc;

use crate::auth::{authorize_upload, Requester};
use crate::file::{FileService, FileType, ListParams, UploadNotifier};
use crate::share::{IssueOptions, ShareLinkService};
use crate::web::dto::{
    parse_optional_json, sanitize_string, ApiResponse, FileListQuery, FileResponse,
    PaginatedResponse, ShareLinkResponse, ShareRequest,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

impl FileListQuery {
    fn into_params(self) -> Result<ListParams, ApiError> {
        let file_type = match self.file_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<FileType>()
                    .map_err(|_| ApiError::bad_request("file_type must be DOCX, XLSX or PPTX"))?,
            ),
        };
        Ok(ListParams {
            q: self.q.filter(|q| !q.trim().is_empty()),
            file_type,
            page: self.page,
            per_page: self.per_page,
        })
    }
}

impl ShareRequest {
    fn into_options(self, default_ttl_days: u32) -> Result<IssueOptions, ApiError> {
        let ttl = if self.no_expiry {
            if self.ttl_seconds.is_some() || self.expires_in_days.is_some() {
                return Err(ApiError::bad_request(
                    "no_expiry cannot be combined with a lifetime",
                ));
            }
            None
        } else if let Some(seconds) = self.ttl_seconds {
            Some(
                Duration::try_seconds(seconds)
                    .ok_or_else(|| ApiError::bad_request("ttl_seconds is out of range"))?,
            )
        } else if let Some(days) = self.expires_in_days {
            Some(
                Duration::try_days(days)
                    .ok_or_else(|| ApiError::bad_request("expires_in_days is out of range"))?,
            )
        } else {
            Some(Duration::days(i64::from(default_ttl_days)))
        };

        Ok(IssueOptions {
            ttl,
            max_downloads: self.max_downloads,
        })
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds the maximum request size")
    } else {
        tracing::debug!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    }
}

/// POST /api/files - Upload a file.
///
/// Request body: multipart/form-data with "file" and optional "description" fields.
#[utoipa::path(
    post,
    path = "/api/files",
    tag = "files",
    request_body(
        content = crate::web::dto::UploadForm,
        content_type = "multipart/form-data",
        description = "Office document plus optional description",
    ),
    responses(
        (status = 201, description = "File uploaded", body = FileResponse),
        (status = 400, description = "Invalid input or disallowed file type"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only operations users may upload"),
        (status = 413, description = "Upload too large")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>), ApiError> {
    let user = state.current_user(&claims).await?;
    // Refuse before the body is read.
    authorize_upload(Requester::from(&user)).map_err(|e| ApiError::forbidden(e.to_string()))?;

    let mut filename: Option<String> = None;
    let mut description: Option<String> = None;
    let mut content: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name().unwrap_or("") {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                content = Some(field.bytes().await.map_err(multipart_error)?);
            }
            "description" => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = sanitize_string(text.trim());
                description = (!text.is_empty()).then_some(text);
            }
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let content = content.ok_or_else(|| ApiError::bad_request("No file content"))?;

    let file = FileService::new(&state.db, state.blobs.as_ref(), state.max_upload_bytes)
        .with_notifier(UploadNotifier::new(
            &state.notifications,
            &state.upload_recipients,
        ))
        .register(&user, &filename, &content, description)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(FileResponse::from(file))),
    ))
}

/// GET /api/files - List files visible to the caller.
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    params(FileListQuery),
    responses(
        (status = 200, description = "Page of files, newest first", body = Vec<FileResponse>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<FileListQuery>,
) -> Result<Json<PaginatedResponse<FileResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let params = query.into_params()?;

    let page = FileService::new(&state.db, state.blobs.as_ref(), state.max_upload_bytes)
        .list(Requester::from(&user), &params)
        .await?;

    Ok(Json(PaginatedResponse::from_page(page, FileResponse::from)))
}

/// GET /api/files/shared - Files reachable through a usable share link.
#[utoipa::path(
    get,
    path = "/api/files/shared",
    tag = "files",
    params(FileListQuery),
    responses(
        (status = 200, description = "Page of shared files", body = Vec<FileResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_shared_files(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<FileListQuery>,
) -> Result<Json<PaginatedResponse<FileResponse>>, ApiError> {
    state.current_user(&claims).await?;
    let params = query.into_params()?;

    let page = FileService::new(&state.db, state.blobs.as_ref(), state.max_upload_bytes)
        .list_shared(&params)
        .await?;

    Ok(Json(PaginatedResponse::from_page(page, FileResponse::from)))
}

/// GET /api/files/:id - Get file metadata.
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;

    let file = FileService::new(&state.db, state.blobs.as_ref(), state.max_upload_bytes)
        .get(file_id, Requester::from(&user))
        .await?;

    Ok(Json(ApiResponse::new(FileResponse::from(file))))
}

/// DELETE /api/files/:id - Delete a file and every link to it.
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 204, description = "File deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = state.current_user(&claims).await?;

    FileService::new(&state.db, state.blobs.as_ref(), state.max_upload_bytes)
        .delete(file_id, Requester::from(&user))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/files/:id/share - Issue a share link.
///
/// The body is optional; without one the link expires after the configured
/// default and has no download ceiling.
#[utoipa::path(
    post,
    path = "/api/files/{id}/share",
    tag = "share",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    request_body(content = ShareRequest, description = "Optional lifetime and download ceiling"),
    responses(
        (status = 201, description = "Share link issued", body = ShareLinkResponse),
        (status = 400, description = "Invalid lifetime or download ceiling"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn share_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<i64>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<ShareLinkResponse>>), ApiError> {
    let user = state.current_user(&claims).await?;
    let options = parse_optional_json::<ShareRequest>(&body)?.into_options(state.default_ttl_days)?;

    let link = ShareLinkService::new(&state.db)
        .issue(file_id, Requester::from(&user), options)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(ShareLinkResponse::from_link(
            link,
            &state.public_base_url,
        ))),
    ))
}

/// GET /api/files/:id/share-links - Links issued for a file.
#[utoipa::path(
    get,
    path = "/api/files/{id}/share-links",
    tag = "share",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "Links for the file, newest first", body = Vec<ShareLinkResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_file_share_links(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<ShareLinkResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;

    let links = ShareLinkService::new(&state.db)
        .list_for_file(file_id, Requester::from(&user))
        .await?;

    let base = state.public_base_url.as_str();
    Ok(Json(ApiResponse::new(
        links
            .into_iter()
            .map(|link| ShareLinkResponse::from_link(link, base))
            .collect(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_request_defaults_to_configured_ttl() {
        let options = ShareRequest::default().into_options(7).unwrap();
        assert_eq!(options.ttl, Some(Duration::days(7)));
        assert_eq!(options.max_downloads, None);
    }

    #[test]
    fn test_share_request_seconds_win_over_days() {
        let req = ShareRequest {
            ttl_seconds: Some(30),
            expires_in_days: Some(2),
            ..Default::default()
        };
        assert_eq!(req.into_options(7).unwrap().ttl, Some(Duration::seconds(30)));
    }

    #[test]
    fn test_share_request_no_expiry() {
        let req = ShareRequest {
            no_expiry: true,
            max_downloads: Some(3),
            ..Default::default()
        };
        let options = req.into_options(7).unwrap();
        assert_eq!(options.ttl, None);
        assert_eq!(options.max_downloads, Some(3));

        let conflicting = ShareRequest {
            no_expiry: true,
            expires_in_days: Some(1),
            ..Default::default()
        };
        assert!(conflicting.into_options(7).is_err());
    }

    #[test]
    fn test_share_request_out_of_range_lifetime() {
        let seconds = ShareRequest {
            ttl_seconds: Some(i64::MAX),
            ..Default::default()
        };
        assert!(seconds.into_options(7).is_err());

        let days = ShareRequest {
            expires_in_days: Some(i64::MAX),
            ..Default::default()
        };
        assert!(days.into_options(7).is_err());
    }

    #[test]
    fn test_list_query_file_type_parsing() {
        let params = FileListQuery {
            file_type: Some("xlsx".to_string()),
            ..Default::default()
        }
        .into_params()
        .unwrap();
        assert_eq!(params.file_type, Some(FileType::Xlsx));

        let bad = FileListQuery {
            file_type: Some("pdf".to_string()),
            ..Default::default()
        };
        assert!(bad.into_params().is_err());

        let blank = FileListQuery {
            q: Some("  ".to_string()),
            ..Default::default()
        }
        .into_params()
        .unwrap();
        assert!(blank.q.is_none());
    }
}

//! Share link handlers, including the public download endpoint.

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::header,
    response::Response,
    Json,
};
use chrono::Duration;
use std::sync::Arc;

use crate::auth::{authorize_link_consumer, Requester};
use crate::file::FileService;
use crate::share::{is_well_formed, ConsumeOutcome, Denial, ShareLinkService};
use crate::web::dto::{parse_optional_json, ApiResponse, ExtendRequest, ShareLinkResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::{AuthUser, OptionalAuthUser};

/// Extension applied when the request names none.
const DEFAULT_EXTEND_DAYS: i64 = 7;

/// Build a Content-Disposition value that cannot break out of the header.
///
/// Plain ASCII names are quoted as-is. Anything else gets an ASCII fallback
/// with unsafe characters replaced by `_`, plus an RFC 5987 `filename*`.
fn content_disposition_header(filename: &str) -> String {
    let needs_encoding = filename
        .chars()
        .any(|c| !c.is_ascii() || c.is_control() || c == '"' || c == '\\');

    if !needs_encoding {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect();
    let printable: String = filename.chars().filter(|c| !c.is_control()).collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(&printable)
    )
}

fn link_responses(state: &AppState, links: Vec<crate::share::ShareLink>) -> Vec<ShareLinkResponse> {
    links
        .into_iter()
        .map(|link| ShareLinkResponse::from_link(link, &state.public_base_url))
        .collect()
}

/// GET /api/share-links - Links visible to the caller.
#[utoipa::path(
    get,
    path = "/api/share-links",
    tag = "share",
    responses(
        (status = 200, description = "All links for operations users, own links otherwise", body = Vec<ShareLinkResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_share_links(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<Vec<ShareLinkResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;

    let links = ShareLinkService::new(&state.db)
        .list_for_user(Requester::from(&user))
        .await?;

    Ok(Json(ApiResponse::new(link_responses(&state, links))))
}

/// GET /api/share-links/:id - One link.
#[utoipa::path(
    get,
    path = "/api/share-links/{id}",
    tag = "share",
    params(
        ("id" = i64, Path, description = "Share link ID")
    ),
    responses(
        (status = 200, description = "Share link", body = ShareLinkResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Share link not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_share_link(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(link_id): Path<i64>,
) -> Result<Json<ApiResponse<ShareLinkResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;

    let link = ShareLinkService::new(&state.db)
        .get(link_id, Requester::from(&user))
        .await?;

    Ok(Json(ApiResponse::new(ShareLinkResponse::from_link(
        link,
        &state.public_base_url,
    ))))
}

/// POST /api/share-links/:id/deactivate - Switch a link off.
#[utoipa::path(
    post,
    path = "/api/share-links/{id}/deactivate",
    tag = "share",
    params(
        ("id" = i64, Path, description = "Share link ID")
    ),
    responses(
        (status = 200, description = "Link deactivated", body = ShareLinkResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Share link not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn deactivate_share_link(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(link_id): Path<i64>,
) -> Result<Json<ApiResponse<ShareLinkResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;

    let link = ShareLinkService::new(&state.db)
        .deactivate(link_id, Requester::from(&user))
        .await?;

    Ok(Json(ApiResponse::new(ShareLinkResponse::from_link(
        link,
        &state.public_base_url,
    ))))
}

/// POST /api/share-links/:id/extend - Push a link's expiry back.
#[utoipa::path(
    post,
    path = "/api/share-links/{id}/extend",
    tag = "share",
    params(
        ("id" = i64, Path, description = "Share link ID")
    ),
    request_body(content = ExtendRequest, description = "Days to add (default 7)"),
    responses(
        (status = 200, description = "Link extended", body = ShareLinkResponse),
        (status = 400, description = "Invalid extension"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Share link not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn extend_share_link(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(link_id): Path<i64>,
    body: Bytes,
) -> Result<Json<ApiResponse<ShareLinkResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let req: ExtendRequest = parse_optional_json(&body)?;
    let days = req.days.unwrap_or(DEFAULT_EXTEND_DAYS);
    let additional =
        Duration::try_days(days).ok_or_else(|| ApiError::bad_request("days is out of range"))?;

    let link = ShareLinkService::new(&state.db)
        .extend(link_id, Requester::from(&user), additional)
        .await?;

    Ok(Json(ApiResponse::new(ShareLinkResponse::from_link(
        link,
        &state.public_base_url,
    ))))
}

/// GET /api/share/:token/download - Download through a share link.
///
/// Open to anonymous callers and clients. The role check runs before the
/// link is consumed, so a refused caller never uses up a download.
#[utoipa::path(
    get,
    path = "/api/share/{token}/download",
    tag = "share",
    params(
        ("token" = String, Path, description = "Share token")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 401, description = "Bearer token names a missing or disabled account"),
        (status = 403, description = "Operations users cannot consume share links"),
        (status = 404, description = "Unknown token"),
        (status = 410, description = "Link expired, deactivated or out of downloads")
    )
)]
pub async fn download_shared_file(
    State(state): State<Arc<AppState>>,
    OptionalAuthUser(claims): OptionalAuthUser,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let requester = state.identity().current_user(claims.as_ref()).await?;
    authorize_link_consumer(requester.as_ref().map(|user| user.role))
        .map_err(|e| ApiError::forbidden(e.to_string()))?;

    // Nothing the generator produces looks like this, so skip the lookup.
    if !is_well_formed(&token) {
        return Err(ApiError::denied(Denial::NotFound));
    }

    let (link, file) = match ShareLinkService::new(&state.db)
        .validate_and_consume(&token)
        .await?
    {
        ConsumeOutcome::Granted { link, file } => (link, file),
        ConsumeOutcome::Denied(denial) => return Err(ApiError::denied(denial)),
    };

    let content = FileService::new(&state.db, state.blobs.as_ref(), state.max_upload_bytes)
        .read_content(&file)
        .await
        .map_err(|e| {
            tracing::error!(
                link_id = link.id,
                file_id = file.id,
                operation = "download",
                "Download slot taken but content unavailable: {}",
                e
            );
            ApiError::from(e)
        })?;

    let response = Response::builder()
        .header(header::CONTENT_TYPE, file.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&file.original_name),
        )
        .header(header::CONTENT_LENGTH, content.len())
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })?;

    Ok(response)
}

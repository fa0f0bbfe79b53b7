//! Router configuration for Web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use super::dto;
use super::handlers::{self, AppState};
use super::middleware::{
    auth_rate_limit, create_cors_layer, download_rate_limit, jwt_auth, security_headers,
    RateLimitState,
};

/// Request bodies may exceed the upload ceiling by this much for multipart framing.
pub const BODY_LIMIT_SLACK: u64 = 1024 * 1024;

/// OpenAPI document for the public surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "sharegate API",
        description = "Role-gated document sharing with expiring, count-limited share links"
    ),
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::verify_email,
        handlers::auth::resend_verification,
        handlers::auth::me,
        handlers::auth::change_password,
        handlers::file::upload_file,
        handlers::file::list_files,
        handlers::file::list_shared_files,
        handlers::file::get_file,
        handlers::file::delete_file,
        handlers::file::share_file,
        handlers::file::list_file_share_links,
        handlers::share::list_share_links,
        handlers::share::get_share_link,
        handlers::share::deactivate_share_link,
        handlers::share::extend_share_link,
        handlers::share::download_shared_file,
    ),
    components(schemas(
        dto::RegisterRequest,
        dto::LoginRequest,
        dto::RefreshRequest,
        dto::LogoutRequest,
        dto::VerifyEmailRequest,
        dto::ResendVerificationRequest,
        dto::ChangePasswordRequest,
        dto::UploadForm,
        dto::ShareRequest,
        dto::ExtendRequest,
        dto::UserInfo,
        dto::LoginResponse,
        dto::MessageResponse,
        dto::FileResponse,
        dto::ShareLinkResponse,
        dto::PaginationMeta,
        crate::file::FileType,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and sessions"),
        (name = "files", description = "Document upload and management"),
        (name = "share", description = "Share links and public downloads")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    rate_limits: Arc<RateLimitState>,
    cors_origins: &[String],
) -> Router {
    let keys = app_state.keys.clone();
    let body_limit = usize::try_from(app_state.max_upload_bytes.saturating_add(BODY_LIMIT_SLACK))
        .unwrap_or(usize::MAX);

    // Credential endpoints are throttled per client
    let auth_limits = rate_limits.clone();
    let auth_throttled_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .route("/verify-email", post(handlers::verify_email))
        .route("/resend-verification", post(handlers::resend_verification))
        .route("/password", post(handlers::change_password))
        .route_layer(middleware::from_fn(move |req, next| {
            auth_rate_limit(auth_limits.clone(), req, next)
        }));

    let auth_routes = Router::new()
        .merge(auth_throttled_routes)
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::me));

    let file_routes = Router::new()
        .route("/", post(handlers::upload_file).get(handlers::list_files))
        .route("/shared", get(handlers::list_shared_files))
        .route("/:id", get(handlers::get_file).delete(handlers::delete_file))
        .route("/:id/share", post(handlers::share_file))
        .route("/:id/share-links", get(handlers::list_file_share_links));

    let share_link_routes = Router::new()
        .route("/", get(handlers::list_share_links))
        .route("/:id", get(handlers::get_share_link))
        .route("/:id/deactivate", post(handlers::deactivate_share_link))
        .route("/:id/extend", post(handlers::extend_share_link));

    let download_limits = rate_limits;
    let download_routes = Router::new()
        .route("/:token/download", get(handlers::download_shared_file))
        .route_layer(middleware::from_fn(move |req, next| {
            download_rate_limit(download_limits.clone(), req, next)
        }));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/files", file_routes)
        .nest("/share-links", share_link_routes)
        .nest("/share", download_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(middleware::from_fn(move |req, next| {
                    jwt_auth(keys.clone(), req, next)
                })),
        )
        .with_state(app_state)
}

/// Swagger UI at `/swagger-ui`, document at `/api-docs/openapi.json`.
pub fn create_swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_health_router() {
        let response = create_health_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[test]
    fn test_openapi_lists_share_download() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/share/{token}/download"));
        assert!(doc.paths.paths.contains_key("/api/files/{id}/share"));
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}

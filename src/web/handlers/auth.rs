//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::auth::{AuthTokens, RegistrationRequest, RegistrationService};
use crate::db::User;
use crate::web::dto::{
    ApiResponse, ChangePasswordRequest, LoginRequest, LoginResponse, LogoutRequest,
    MessageResponse, RefreshRequest, RegisterRequest, ResendVerificationRequest, UserInfo,
    ValidatedJson, VerifyEmailRequest,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

fn login_response(user: &User, tokens: AuthTokens) -> LoginResponse {
    LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        user: UserInfo::from(user),
    }
}

/// POST /api/auth/register - Create a client account.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; verification mail queued", body = UserInfo),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserInfo>>), ApiError> {
    let request =
        RegistrationRequest::new(req.email, req.password).with_names(req.first_name, req.last_name);

    let user = RegistrationService::new(&state.db, &state.notifications, &state.frontend_url)
        .register(request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(UserInfo::from(&user))),
    ))
}

/// POST /api/auth/login - Exchange credentials for tokens.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Account is disabled")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let (user, tokens) = state
        .identity()
        .authenticate(&req.email, &req.password)
        .await?;

    Ok(Json(ApiResponse::new(login_response(&user, tokens))))
}

/// POST /api/auth/refresh - Rotate a refresh token.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = LoginResponse),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let (user, tokens) = state.identity().refresh(&req.refresh_token).await?;
    Ok(Json(ApiResponse::new(login_response(&user, tokens))))
}

/// POST /api/auth/logout - Revoke a refresh token.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    )
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.identity().logout(&req.refresh_token).await?;
    Ok(Json(ApiResponse::new(MessageResponse::new("Logged out"))))
}

/// POST /api/auth/verify-email - Redeem a verification token.
#[utoipa::path(
    post,
    path = "/api/auth/verify-email",
    tag = "auth",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = UserInfo),
        (status = 400, description = "Token expired or email already verified"),
        (status = 404, description = "Unknown token")
    )
)]
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = RegistrationService::new(&state.db, &state.notifications, &state.frontend_url)
        .verify_email(&req.token)
        .await?;

    Ok(Json(ApiResponse::new(UserInfo::from(&user))))
}

/// POST /api/auth/resend-verification - Queue a fresh verification mail.
#[utoipa::path(
    post,
    path = "/api/auth/resend-verification",
    tag = "auth",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Verification mail queued", body = MessageResponse),
        (status = 400, description = "Email already verified"),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ResendVerificationRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    RegistrationService::new(&state.db, &state.notifications, &state.frontend_url)
        .resend_verification(&req.email)
        .await?;

    Ok(Json(ApiResponse::new(MessageResponse::new(
        "Verification email sent",
    ))))
}

/// GET /api/auth/me - Current user.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserInfo),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = state.current_user(&claims).await?;
    Ok(Json(ApiResponse::new(UserInfo::from(&user))))
}

/// POST /api/auth/password - Change the current user's password.
#[utoipa::path(
    post,
    path = "/api/auth/password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed; sessions revoked", body = MessageResponse),
        (status = 400, description = "Invalid new password"),
        (status = 401, description = "Current password is incorrect")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;

    state
        .identity()
        .change_password(&user, &req.current_password, &req.new_password)
        .await?;

    Ok(Json(ApiResponse::new(MessageResponse::new(
        "Password changed",
    ))))
}

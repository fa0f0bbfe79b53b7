//! Bearer-token extraction.
//!
//! The router injects the shared [`TokenKeys`] into every request's
//! extensions; the extractors below read them back and decode the
//! `Authorization: Bearer` header.

use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::{JwtClaims, TokenKeys};
use crate::web::error::ApiError;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn token_keys(parts: &Parts) -> Option<&Arc<TokenKeys>> {
    parts.extensions.get::<Arc<TokenKeys>>()
}

/// Extractor for authenticated users.
///
/// Rejects with 401 when the header is missing or the token does not verify.
#[derive(Debug, Clone)]
pub struct AuthUser(pub JwtClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(parts).ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

        let keys = token_keys(parts).ok_or_else(|| ApiError::internal("JWT state not configured"))?;

        let claims = keys.decode(token).map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            ApiError::unauthorized("Invalid or expired token")
        })?;

        Ok(AuthUser(claims))
    }
}

/// Optional authentication extractor.
///
/// Similar to AuthUser but treats a missing or unverifiable token as an
/// anonymous caller.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<JwtClaims>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(OptionalAuthUser(None));
        };
        let Some(keys) = token_keys(parts) else {
            return Ok(OptionalAuthUser(None));
        };

        match keys.decode(token) {
            Ok(claims) => Ok(OptionalAuthUser(Some(claims))),
            Err(e) => {
                tracing::debug!("Ignoring unverifiable bearer token: {}", e);
                Ok(OptionalAuthUser(None))
            }
        }
    }
}

/// Middleware function to inject the token keys into request extensions.
pub async fn jwt_auth(keys: Arc<TokenKeys>, mut request: Request<Body>, next: Next) -> Response {
    request.extensions_mut().insert(keys);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request as HttpRequest};

    use crate::db::Role;

    fn parts_with(header: Option<&str>, keys: Option<Arc<TokenKeys>>) -> Parts {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        if let Some(keys) = keys {
            parts.extensions.insert(keys);
        }
        parts
    }

    fn sample_token(keys: &TokenKeys) -> String {
        let user = crate::db::User {
            id: 3,
            email: "client@example.com".to_string(),
            password: "hash".to_string(),
            first_name: None,
            last_name: None,
            role: Role::Client,
            is_verified: true,
            is_active: true,
            created_at: "2024-01-01 00:00:00.000000".to_string(),
        };
        keys.issue_access_token(&user).unwrap()
    }

    #[tokio::test]
    async fn test_auth_user_accepts_valid_token() {
        let keys = Arc::new(TokenKeys::new("test-secret", 900, 7));
        let header = format!("Bearer {}", sample_token(&keys));
        let mut parts = parts_with(Some(&header), Some(keys));

        let AuthUser(claims) = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(claims.sub, 3);
        assert_eq!(claims.role, Role::Client);
    }

    #[tokio::test]
    async fn test_auth_user_rejects_missing_header() {
        let keys = Arc::new(TokenKeys::new("test-secret", 900, 7));
        let mut parts = parts_with(None, Some(keys));
        assert!(AuthUser::from_request_parts(&mut parts, &()).await.is_err());
    }

    #[tokio::test]
    async fn test_auth_user_rejects_foreign_secret() {
        let issuer = TokenKeys::new("secret1", 900, 7);
        let header = format!("Bearer {}", sample_token(&issuer));
        let mut parts = parts_with(Some(&header), Some(Arc::new(TokenKeys::new("secret2", 900, 7))));
        assert!(AuthUser::from_request_parts(&mut parts, &()).await.is_err());
    }

    #[tokio::test]
    async fn test_optional_auth_user_is_lenient() {
        let keys = Arc::new(TokenKeys::new("test-secret", 900, 7));

        let mut parts = parts_with(None, Some(keys.clone()));
        let OptionalAuthUser(claims) =
            OptionalAuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(claims.is_none());

        let mut parts = parts_with(Some("Bearer garbage"), Some(keys.clone()));
        let OptionalAuthUser(claims) =
            OptionalAuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(claims.is_none());

        let header = format!("Bearer {}", sample_token(&keys));
        let mut parts = parts_with(Some(&header), Some(keys));
        let OptionalAuthUser(claims) =
            OptionalAuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(claims.map(|c| c.sub), Some(3));
    }
}

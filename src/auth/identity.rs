//! Identity: login, JWT sessions and refresh-token rotation.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{hash_password_async, require_active, verify_password_async, PasswordError};
use crate::datetime::to_db;
use crate::db::{NewRefreshToken, RefreshTokenRepository, Role, User, UserRepository};
use crate::{Database, Result, SharegateError};

/// JWT claims carried by every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: i64,
    /// Email at issue time.
    pub email: String,
    /// Role at issue time.
    pub role: Role,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
    /// JWT ID (unique identifier).
    pub jti: String,
}

/// Signing material and token lifetimes.
#[derive(Clone)]
pub struct TokenKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    /// Access token lifetime in seconds.
    pub access_token_expiry: u64,
    /// Refresh token lifetime in days.
    pub refresh_token_expiry_days: u64,
}

impl TokenKeys {
    /// Create keys from an HS256 secret.
    pub fn new(secret: &str, access_token_expiry: u64, refresh_token_expiry_days: u64) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_token_expiry,
            refresh_token_expiry_days,
        }
    }

    /// Sign an access token for `user`.
    pub fn issue_access_token(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now + self.access_token_expiry,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(user_id = user.id, "Failed to encode JWT: {}", e);
            SharegateError::Storage("failed to generate token".to_string())
        })
    }

    /// Verify an access token and return its claims.
    pub fn decode(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("JWT validation failed: {}", e);
                SharegateError::Auth("invalid or expired token".to_string())
            })
    }
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry_days", &self.refresh_token_expiry_days)
            .finish_non_exhaustive()
    }
}

/// Token pair handed to a client after login or refresh.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    /// Signed JWT.
    pub access_token: String,
    /// Opaque refresh token.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Login, refresh, logout and password changes.
pub struct IdentityService<'a> {
    db: &'a Database,
    keys: &'a TokenKeys,
}

impl<'a> IdentityService<'a> {
    /// Create a new service.
    pub fn new(db: &'a Database, keys: &'a TokenKeys) -> Self {
        Self { db, keys }
    }

    /// Check credentials and open a session.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<(User, AuthTokens)> {
        const BAD_CREDENTIALS: &str = "invalid email or password";

        let user = UserRepository::new(self.db.pool())
            .get_by_email(email)
            .await?
            .ok_or_else(|| SharegateError::Auth(BAD_CREDENTIALS.to_string()))?;

        verify_password_async(password.to_string(), user.password.clone())
            .await
            .map_err(|_| SharegateError::Auth(BAD_CREDENTIALS.to_string()))?;

        require_active(&user)?;

        let tokens = self.open_session(&user).await?;
        info!(user_id = user.id, "User logged in");
        Ok((user, tokens))
    }

    /// Rotate a refresh token.
    ///
    /// The presented token is revoked atomically, so replaying it fails.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(User, AuthTokens)> {
        let consumed = RefreshTokenRepository::new(self.db.pool())
            .consume_valid(refresh_token)
            .await?
            .ok_or_else(|| SharegateError::Auth("invalid or expired refresh token".to_string()))?;

        let user = UserRepository::new(self.db.pool())
            .get_by_id(consumed.user_id)
            .await?
            .ok_or_else(|| SharegateError::Auth("user no longer exists".to_string()))?;
        require_active(&user)?;

        let tokens = self.open_session(&user).await?;
        Ok((user, tokens))
    }

    /// Revoke a refresh token. Unknown or already revoked tokens are fine.
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        RefreshTokenRepository::new(self.db.pool())
            .revoke(refresh_token)
            .await?;
        Ok(())
    }

    /// Resolve the caller behind a set of claims.
    ///
    /// `None` claims mean an anonymous caller. Claims whose user vanished or
    /// was disabled are rejected.
    pub async fn current_user(&self, claims: Option<&JwtClaims>) -> Result<Option<User>> {
        let Some(claims) = claims else {
            return Ok(None);
        };

        let user = UserRepository::new(self.db.pool())
            .get_by_id(claims.sub)
            .await?
            .ok_or_else(|| SharegateError::Auth("user no longer exists".to_string()))?;

        if !user.is_active {
            return Err(SharegateError::Auth("account is disabled".to_string()));
        }
        Ok(Some(user))
    }

    /// Change a password after re-checking the old one.
    ///
    /// Every outstanding refresh token of the user is revoked.
    pub async fn change_password(&self, user: &User, old: &str, new: &str) -> Result<()> {
        verify_password_async(old.to_string(), user.password.clone())
            .await
            .map_err(|_| SharegateError::Auth("current password is incorrect".to_string()))?;

        let hash = hash_password_async(new.to_string())
            .await
            .map_err(|e| match e {
                PasswordError::TooShort | PasswordError::TooLong => {
                    SharegateError::Validation(e.to_string())
                }
                other => SharegateError::Storage(other.to_string()),
            })?;

        UserRepository::new(self.db.pool())
            .update_password(user.id, &hash)
            .await?;
        let revoked = RefreshTokenRepository::new(self.db.pool())
            .revoke_all_for_user(user.id)
            .await?;

        info!(user_id = user.id, revoked, "Password changed");
        Ok(())
    }

    async fn open_session(&self, user: &User) -> Result<AuthTokens> {
        let access_token = self.keys.issue_access_token(user)?;
        let refresh_token = uuid::Uuid::new_v4().to_string();
        let expires_at =
            Utc::now() + Duration::days(self.keys.refresh_token_expiry_days as i64);

        RefreshTokenRepository::new(self.db.pool())
            .create(&NewRefreshToken {
                user_id: user.id,
                token: refresh_token.clone(),
                expires_at: to_db(&expires_at),
            })
            .await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            expires_in: self.keys.access_token_expiry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::db::NewUser;

    const SECRET: &str = "test-secret";

    async fn setup() -> (Database, TokenKeys, User) {
        let db = Database::open_in_memory().await.unwrap();
        let hash = hash_password("password123").unwrap();
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("ops@example.com", hash).with_role(Role::Operations))
            .await
            .unwrap();
        (db, TokenKeys::new(SECRET, 900, 7), user)
    }

    #[tokio::test]
    async fn test_authenticate_and_decode() {
        let (db, keys, user) = setup().await;
        let service = IdentityService::new(&db, &keys);

        let (logged_in, tokens) = service
            .authenticate("OPS@example.com", "password123")
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(tokens.expires_in, 900);

        let claims = keys.decode(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Operations);
        assert_eq!(claims.email, "ops@example.com");
    }

    #[tokio::test]
    async fn test_authenticate_rejects_bad_credentials() {
        let (db, keys, _user) = setup().await;
        let service = IdentityService::new(&db, &keys);

        assert!(matches!(
            service.authenticate("ops@example.com", "wrong-password").await,
            Err(SharegateError::Auth(_))
        ));
        assert!(matches!(
            service.authenticate("ghost@example.com", "password123").await,
            Err(SharegateError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_inactive_is_forbidden() {
        let (db, keys, user) = setup().await;
        UserRepository::new(db.pool())
            .set_active(user.id, false)
            .await
            .unwrap();

        let service = IdentityService::new(&db, &keys);
        assert!(matches!(
            service.authenticate("ops@example.com", "password123").await,
            Err(SharegateError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let (db, keys, _user) = setup().await;
        let service = IdentityService::new(&db, &keys);

        let (_, first) = service
            .authenticate("ops@example.com", "password123")
            .await
            .unwrap();
        let (_, second) = service.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        // The old token is spent.
        assert!(matches!(
            service.refresh(&first.refresh_token).await,
            Err(SharegateError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (db, keys, _user) = setup().await;
        let service = IdentityService::new(&db, &keys);

        let (_, tokens) = service
            .authenticate("ops@example.com", "password123")
            .await
            .unwrap();
        service.logout(&tokens.refresh_token).await.unwrap();
        service.logout(&tokens.refresh_token).await.unwrap();
        assert!(service.refresh(&tokens.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_current_user() {
        let (db, keys, user) = setup().await;
        let service = IdentityService::new(&db, &keys);

        assert!(service.current_user(None).await.unwrap().is_none());

        let token = keys.issue_access_token(&user).unwrap();
        let claims = keys.decode(&token).unwrap();
        let found = service.current_user(Some(&claims)).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let mut ghost = claims.clone();
        ghost.sub = 9999;
        assert!(matches!(
            service.current_user(Some(&ghost)).await,
            Err(SharegateError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password_revokes_sessions() {
        let (db, keys, user) = setup().await;
        let service = IdentityService::new(&db, &keys);

        let (_, tokens) = service
            .authenticate("ops@example.com", "password123")
            .await
            .unwrap();

        assert!(matches!(
            service.change_password(&user, "wrong-old", "newpassword1").await,
            Err(SharegateError::Auth(_))
        ));

        service
            .change_password(&user, "password123", "newpassword1")
            .await
            .unwrap();
        assert!(service.refresh(&tokens.refresh_token).await.is_err());
        assert!(service
            .authenticate("ops@example.com", "newpassword1")
            .await
            .is_ok());
    }

    #[test]
    fn test_decode_rejects_foreign_signature() {
        let keys = TokenKeys::new(SECRET, 900, 7);
        let other = TokenKeys::new("another-secret", 900, 7);
        let user = User {
            id: 1,
            email: "a@example.com".to_string(),
            password: String::new(),
            first_name: None,
            last_name: None,
            role: Role::Client,
            is_verified: true,
            is_active: true,
            created_at: String::new(),
        };
        let token = other.issue_access_token(&user).unwrap();
        assert!(keys.decode(&token).is_err());
    }
}

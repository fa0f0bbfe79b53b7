//! Refresh token repository for JWT sessions.

use super::DbPool;
use crate::datetime::now_db;
use crate::Result;

/// Refresh token entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    /// Token ID.
    pub id: i64,
    /// User ID.
    pub user_id: i64,
    /// Token string.
    pub token: String,
    /// Expiration timestamp.
    pub expires_at: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Revocation timestamp (None if not revoked).
    pub revoked_at: Option<String>,
}

/// New refresh token for creation.
pub struct NewRefreshToken {
    /// User ID.
    pub user_id: i64,
    /// Token string.
    pub token: String,
    /// Expiration timestamp in storage format.
    pub expires_at: String,
}

/// Repository for refresh token operations.
pub struct RefreshTokenRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> RefreshTokenRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Store a new refresh token.
    pub async fn create(&self, new_token: &NewRefreshToken) -> Result<RefreshToken> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "INSERT INTO refresh_tokens (user_id, token, expires_at, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, user_id, token, expires_at, created_at, revoked_at",
        )
        .bind(new_token.user_id)
        .bind(&new_token.token)
        .bind(&new_token.expires_at)
        .bind(now_db())
        .fetch_one(self.pool)
        .await?;
        Ok(token)
    }

    /// Get a refresh token by token string.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let result = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token, expires_at, created_at, revoked_at
             FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(result)
    }

    /// Atomically revoke a valid (unexpired, unrevoked) token and return it.
    ///
    /// Two concurrent refreshes with the same token cannot both succeed.
    pub async fn consume_valid(&self, token: &str) -> Result<Option<RefreshToken>> {
        let now = now_db();
        let result = sqlx::query_as::<_, RefreshToken>(
            "UPDATE refresh_tokens SET revoked_at = ?
             WHERE token = ? AND revoked_at IS NULL AND expires_at > ?
             RETURNING id, user_id, token, expires_at, created_at, revoked_at",
        )
        .bind(&now)
        .bind(token)
        .bind(&now)
        .fetch_optional(self.pool)
        .await?;
        Ok(result)
    }

    /// Revoke a refresh token.
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE token = ? AND revoked_at IS NULL",
        )
        .bind(now_db())
        .bind(token)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke all tokens for a user.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(now_db())
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete expired and revoked tokens.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ? OR revoked_at IS NOT NULL")
                .bind(now_db())
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

//! Email verification token repository.

use super::DbPool;
use crate::datetime::now_db;
use crate::Result;

/// Email verification token entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VerificationToken {
    /// Token ID.
    pub id: i64,
    /// User the token verifies.
    pub user_id: i64,
    /// Token string.
    pub token: String,
    /// Expiration timestamp.
    pub expires_at: String,
    /// Creation timestamp.
    pub created_at: String,
}

/// Repository for verification token operations.
pub struct VerificationTokenRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> VerificationTokenRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Store a token for a user, replacing any token they already had.
    pub async fn replace_for_user(
        &self,
        user_id: i64,
        token: &str,
        expires_at: &str,
    ) -> Result<VerificationToken> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM verification_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let created = sqlx::query_as::<_, VerificationToken>(
            "INSERT INTO verification_tokens (user_id, token, expires_at, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, user_id, token, expires_at, created_at",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .bind(now_db())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    /// Look up a token.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<VerificationToken>> {
        let result = sqlx::query_as::<_, VerificationToken>(
            "SELECT id, user_id, token, expires_at, created_at
             FROM verification_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(result)
    }

    /// Mark the token's user verified and remove the token in one transaction.
    ///
    /// Returns false if the user was already verified (nothing changes then).
    pub async fn redeem(&self, token: &VerificationToken) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE users SET is_verified = 1 WHERE id = ? AND is_verified = 0")
            .bind(token.user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM verification_tokens WHERE id = ?")
            .bind(token.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated > 0)
    }

    /// Delete expired tokens.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE expires_at < ?")
            .bind(now_db())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

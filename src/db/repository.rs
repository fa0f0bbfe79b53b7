//! User repository for sharegate.
//!
//! This module provides persistence operations for users.

use super::user::{normalize_email, NewUser, Role, User};
use super::DbPool;
use crate::{Result, SharegateError};

const USER_COLUMNS: &str =
    "id, email, password, first_name, last_name, role, is_verified, is_active, created_at";

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    ///
    /// A duplicate email yields [`SharegateError::Conflict`].
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (email, password, first_name, last_name, role, is_verified, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.email)
            .bind(&new_user.password)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(new_user.role.as_str())
            .bind(new_user.is_verified)
            .bind(crate::datetime::now_db())
            .fetch_one(self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    SharegateError::Conflict("email already registered".to_string())
                }
                _ => SharegateError::Database(e.to_string()),
            })
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(result)
    }

    /// Get a user by email (normalised before lookup).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(self.pool)
            .await?;
        Ok(result)
    }

    /// Replace the password hash.
    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Change a user's role.
    pub async fn update_role(&self, id: i64, role: Role) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Activate or deactivate an account.
    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Emails of active operations users, used as a default upload audience.
    pub async fn operations_emails(&self) -> Result<Vec<String>> {
        let emails = sqlx::query_scalar::<_, String>(
            "SELECT email FROM users WHERE role = 'OPERATIONS' AND is_active = 1 ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(emails)
    }

    /// Count all users.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

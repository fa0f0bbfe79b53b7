//! User registration and email verification.
//!
//! Self-service sign-ups always create an unverified CLIENT. A verification
//! token is stored server side and mailed out through the notification queue;
//! mail failures never fail the registration itself.

use chrono::{Duration, Utc};
use tracing::info;
use validator::ValidateEmail;

use crate::auth::hash_password_async;
use crate::datetime::{from_db, to_db};
use crate::db::{NewUser, Role, User, UserRepository, VerificationTokenRepository};
use crate::notify::{templates, NotificationQueue};
use crate::share::generate_token;
use crate::{Database, Result, SharegateError};

/// Hours a verification token stays valid.
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

/// Maximum length of first/last name.
pub const MAX_NAME_LENGTH: usize = 150;

/// Registration request data.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    /// Login email.
    pub email: String,
    /// Password (8-128 characters).
    pub password: String,
    /// Optional given name.
    pub first_name: Option<String>,
    /// Optional family name.
    pub last_name: Option<String>,
}

impl RegistrationRequest {
    /// Create a new registration request.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
        }
    }

    /// Set the given and family names.
    pub fn with_names(mut self, first: Option<String>, last: Option<String>) -> Self {
        self.first_name = first;
        self.last_name = last;
        self
    }
}

fn clean_name(name: Option<String>) -> Result<Option<String>> {
    let Some(name) = name else {
        return Ok(None);
    };
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(SharegateError::Validation(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// Registration, verification and re-sending of verification mail.
pub struct RegistrationService<'a> {
    db: &'a Database,
    notifier: &'a NotificationQueue,
    frontend_url: &'a str,
}

impl<'a> RegistrationService<'a> {
    /// Create a new service.
    pub fn new(db: &'a Database, notifier: &'a NotificationQueue, frontend_url: &'a str) -> Self {
        Self {
            db,
            notifier,
            frontend_url,
        }
    }

    /// Register a self-service CLIENT account and queue its verification mail.
    pub async fn register(&self, request: RegistrationRequest) -> Result<User> {
        let user = self.create_account(request, Role::Client, false).await?;
        self.send_verification(&user).await?;
        Ok(user)
    }

    /// Create an already verified account with the given role.
    ///
    /// Used by the `create-user` command to bootstrap operations staff.
    pub async fn register_with_role(&self, request: RegistrationRequest, role: Role) -> Result<User> {
        self.create_account(request, role, true).await
    }

    async fn create_account(
        &self,
        request: RegistrationRequest,
        role: Role,
        verified: bool,
    ) -> Result<User> {
        let email = crate::db::normalize_email(&request.email);
        if !email.validate_email() {
            return Err(SharegateError::Validation(
                "enter a valid email address".to_string(),
            ));
        }
        let first_name = clean_name(request.first_name)?;
        let last_name = clean_name(request.last_name)?;

        let password_hash = hash_password_async(request.password)
            .await
            .map_err(|e| match e {
                crate::auth::PasswordError::TooShort | crate::auth::PasswordError::TooLong => {
                    SharegateError::Validation(e.to_string())
                }
                other => SharegateError::Storage(other.to_string()),
            })?;

        let mut new_user = NewUser::new(email, password_hash)
            .with_names(first_name, last_name)
            .with_role(role);
        if verified {
            new_user = new_user.verified();
        }

        let user = UserRepository::new(self.db.pool()).create(&new_user).await?;

        info!(user_id = user.id, role = %user.role, "New user registered");
        Ok(user)
    }

    /// Redeem a verification token.
    pub async fn verify_email(&self, token: &str) -> Result<User> {
        let tokens = VerificationTokenRepository::new(self.db.pool());
        let record = tokens
            .get_by_token(token)
            .await?
            .ok_or_else(|| SharegateError::NotFound("verification token".to_string()))?;

        if from_db(&record.expires_at)? < Utc::now() {
            return Err(SharegateError::Validation(
                "verification link has expired".to_string(),
            ));
        }

        if !tokens.redeem(&record).await? {
            return Err(SharegateError::Validation(
                "Email is already verified".to_string(),
            ));
        }

        let user = UserRepository::new(self.db.pool())
            .get_by_id(record.user_id)
            .await?
            .ok_or_else(|| SharegateError::NotFound("user".to_string()))?;

        info!(user_id = user.id, "Email verified");
        Ok(user)
    }

    /// Issue a fresh verification token for an unverified account.
    pub async fn resend_verification(&self, email: &str) -> Result<()> {
        let user = UserRepository::new(self.db.pool())
            .get_by_email(email)
            .await?
            .ok_or_else(|| SharegateError::NotFound("user".to_string()))?;

        if user.is_verified {
            return Err(SharegateError::Validation(
                "Email is already verified".to_string(),
            ));
        }

        self.send_verification(&user).await
    }

    async fn send_verification(&self, user: &User) -> Result<()> {
        let token = generate_token();
        let expires_at = to_db(&(Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS)));

        VerificationTokenRepository::new(self.db.pool())
            .replace_for_user(user.id, &token, &expires_at)
            .await?;

        let url = templates::verification_url(self.frontend_url, &token);
        self.notifier.enqueue(templates::verification_email(user, &url));
        Ok(())
    }
}

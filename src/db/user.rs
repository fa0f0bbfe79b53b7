//! User model for sharegate.
//!
//! This module defines the User struct and the two-variant Role enum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored or requested role string is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Downloads through share links.
    #[default]
    Client,
    /// Uploads files and manages every file and link.
    Operations,
}

impl Role {
    /// Convert role to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "CLIENT",
            Role::Operations => "OPERATIONS",
        }
    }

    /// Whether this role carries cross-user management privilege.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Operations)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CLIENT" => Ok(Role::Client),
            "OPERATIONS" => Ok(Role::Operations),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// User entity representing a registered account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login email (unique, lower-cased).
    pub email: String,
    /// Password hash (Argon2).
    pub password: String,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// User role for permissions.
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// Whether the email address has been verified.
    pub is_verified: bool,
    /// Whether the account is active.
    pub is_active: bool,
    /// Account creation timestamp.
    pub created_at: String,
}

impl User {
    /// Check if this user is an operations user.
    pub fn is_operations(&self) -> bool {
        self.role.is_elevated()
    }

    /// Display name, falling back to the email address.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login email.
    pub email: String,
    /// Password hash (should be pre-hashed with Argon2).
    pub password: String,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// User role (defaults to Client).
    pub role: Role,
    /// Whether the user starts verified (admin-created accounts).
    pub is_verified: bool,
}

impl NewUser {
    /// Create a new unverified client with the required fields.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: normalize_email(&email.into()),
            password: password.into(),
            first_name: None,
            last_name: None,
            role: Role::Client,
            is_verified: false,
        }
    }

    /// Set the given and family names.
    pub fn with_names(mut self, first: Option<String>, last: Option<String>) -> Self {
        self.first_name = first;
        self.last_name = last;
        self
    }

    /// Set the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Mark the account as already verified.
    pub fn verified(mut self) -> Self {
        self.is_verified = true;
        self
    }
}

/// Trim and lower-case an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

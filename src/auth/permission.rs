//! Access-control gate for sharegate.
//!
//! Every check is a pure function of the requester's role and the resource's
//! ownership, so it can be exercised without a database or an HTTP request.

use thiserror::Error;

use crate::db::{Role, User};

/// Identity and role of whoever is issuing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    /// User ID.
    pub id: i64,
    /// Role at the time of the request.
    pub role: Role,
}

impl Requester {
    /// Build a requester from explicit parts.
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }
}

impl From<&User> for Requester {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
        }
    }
}

/// Permission-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// Uploading is reserved for operations users.
    #[error("only operations users may upload files")]
    OperationsRequired,

    /// The requester neither owns the resource nor holds the operations role.
    #[error("you do not have permission to manage this {0}")]
    NotOwner(&'static str),

    /// Share links are for clients and anonymous callers.
    #[error("share links can only be used by clients or anonymous visitors")]
    ClientOnlyLink,

    /// The account has been disabled.
    #[error("account is disabled")]
    AccountInactive,
}

/// Upload: operations role only.
///
/// # Examples
///
/// ```
/// use sharegate::auth::permission::{authorize_upload, PermissionError, Requester};
/// use sharegate::db::Role;
///
/// assert!(authorize_upload(Requester::new(1, Role::Operations)).is_ok());
/// assert_eq!(
///     authorize_upload(Requester::new(2, Role::Client)),
///     Err(PermissionError::OperationsRequired)
/// );
/// ```
pub fn authorize_upload(requester: Requester) -> Result<(), PermissionError> {
    if requester.role.is_elevated() {
        Ok(())
    } else {
        Err(PermissionError::OperationsRequired)
    }
}

/// Manage (view, delete, share) a file: owner or operations.
pub fn authorize_manage_file(requester: Requester, owner_id: i64) -> Result<(), PermissionError> {
    authorize_owner_or_elevated(requester, owner_id, "file")
}

/// Deactivate, extend or inspect a share link: creator or operations.
pub fn authorize_manage_link(requester: Requester, created_by: i64) -> Result<(), PermissionError> {
    authorize_owner_or_elevated(requester, created_by, "share link")
}

fn authorize_owner_or_elevated(
    requester: Requester,
    owner_id: i64,
    what: &'static str,
) -> Result<(), PermissionError> {
    if requester.id == owner_id || requester.role.is_elevated() {
        Ok(())
    } else {
        Err(PermissionError::NotOwner(what))
    }
}

/// Consume a share link: anonymous callers and clients only.
///
/// # Examples
///
/// ```
/// use sharegate::auth::permission::authorize_link_consumer;
/// use sharegate::db::Role;
///
/// assert!(authorize_link_consumer(None).is_ok());
/// assert!(authorize_link_consumer(Some(Role::Client)).is_ok());
/// assert!(authorize_link_consumer(Some(Role::Operations)).is_err());
/// ```
pub fn authorize_link_consumer(requester_role: Option<Role>) -> Result<(), PermissionError> {
    match requester_role {
        None | Some(Role::Client) => Ok(()),
        Some(Role::Operations) => Err(PermissionError::ClientOnlyLink),
    }
}

/// Reject disabled accounts before any other check.
pub fn require_active(user: &User) -> Result<(), PermissionError> {
    if user.is_active {
        Ok(())
    } else {
        Err(PermissionError::AccountInactive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: i64 = 10;
    const OTHER: i64 = 20;

    #[test]
    fn test_upload_matrix() {
        assert!(authorize_upload(Requester::new(OWNER, Role::Operations)).is_ok());
        assert_eq!(
            authorize_upload(Requester::new(OWNER, Role::Client)),
            Err(PermissionError::OperationsRequired)
        );
    }

    #[test]
    fn test_manage_file_matrix() {
        // owner, any role
        assert!(authorize_manage_file(Requester::new(OWNER, Role::Client), OWNER).is_ok());
        assert!(authorize_manage_file(Requester::new(OWNER, Role::Operations), OWNER).is_ok());
        // non-owner operations
        assert!(authorize_manage_file(Requester::new(OTHER, Role::Operations), OWNER).is_ok());
        // non-owner client
        assert_eq!(
            authorize_manage_file(Requester::new(OTHER, Role::Client), OWNER),
            Err(PermissionError::NotOwner("file"))
        );
    }

    #[test]
    fn test_manage_link_matrix() {
        assert!(authorize_manage_link(Requester::new(OWNER, Role::Client), OWNER).is_ok());
        assert!(authorize_manage_link(Requester::new(OTHER, Role::Operations), OWNER).is_ok());
        assert_eq!(
            authorize_manage_link(Requester::new(OTHER, Role::Client), OWNER),
            Err(PermissionError::NotOwner("share link"))
        );
    }

    #[test]
    fn test_link_consumer_matrix() {
        assert!(authorize_link_consumer(None).is_ok());
        assert!(authorize_link_consumer(Some(Role::Client)).is_ok());
        assert_eq!(
            authorize_link_consumer(Some(Role::Operations)),
            Err(PermissionError::ClientOnlyLink)
        );
    }

    #[test]
    fn test_require_active() {
        let mut user = User {
            id: 1,
            email: "a@example.com".to_string(),
            password: "hash".to_string(),
            first_name: None,
            last_name: None,
            role: Role::Client,
            is_verified: false,
            is_active: true,
            created_at: "2024-01-01 00:00:00.000000".to_string(),
        };
        assert!(require_active(&user).is_ok());

        user.is_active = false;
        assert_eq!(require_active(&user), Err(PermissionError::AccountInactive));
    }

    #[test]
    fn test_requester_from_user() {
        let user = User {
            id: 7,
            email: "ops@example.com".to_string(),
            password: "hash".to_string(),
            first_name: None,
            last_name: None,
            role: Role::Operations,
            is_verified: true,
            is_active: true,
            created_at: "2024-01-01 00:00:00.000000".to_string(),
        };
        assert_eq!(Requester::from(&user), Requester::new(7, Role::Operations));
    }
}

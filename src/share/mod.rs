//! Share links for sharegate.
//!
//! A share link is a bearer token granting downloads of one file, bounded by
//! an optional expiry and an optional download count. Expiry and exhaustion
//! are never swept; they are detected when the token is next presented.

mod link;
mod service;
mod token;

pub use link::{NewShareLink, ShareLink, ShareLinkRepository};
pub use service::{IssueOptions, ShareLinkService, MAX_ISSUE_ATTEMPTS};
pub use token::{generate_token, is_well_formed, OsTokenSource, TokenSource, TOKEN_LENGTH};

use std::fmt;

use crate::file::StoredFile;

/// Reason a share link refused a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Denial {
    /// No link has this token.
    NotFound,
    /// The link was switched off.
    Deactivated,
    /// The link is past its expiry.
    Expired,
    /// Every download slot has been used.
    LimitReached,
}

impl Denial {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Denial::NotFound => "NOT_FOUND",
            Denial::Deactivated => "DEACTIVATED",
            Denial::Expired => "EXPIRED",
            Denial::LimitReached => "LIMIT_REACHED",
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Denial::NotFound => "invalid share link",
            Denial::Deactivated => "share link has been deactivated",
            Denial::Expired => "share link has expired",
            Denial::LimitReached => "download limit reached",
        };
        f.write_str(message)
    }
}

/// Result of presenting a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// A slot was taken; the file may be served.
    Granted {
        /// Link after the increment.
        link: ShareLink,
        /// File the link points at.
        file: StoredFile,
    },
    /// The link refused.
    Denied(Denial),
}

impl ConsumeOutcome {
    /// Whether the download may proceed.
    pub fn is_granted(&self) -> bool {
        matches!(self, ConsumeOutcome::Granted { .. })
    }

    /// The denial reason, if any.
    pub fn denial(&self) -> Option<Denial> {
        match self {
            ConsumeOutcome::Granted { .. } => None,
            ConsumeOutcome::Denied(denial) => Some(*denial),
        }
    }
}

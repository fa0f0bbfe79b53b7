//! Share token generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand_core::{OsRng, RngCore};

/// Random bytes per token.
pub const TOKEN_BYTES: usize = 32;

/// Encoded token length.
pub const TOKEN_LENGTH: usize = 43;

/// Source of fresh tokens. Swappable so collisions can be provoked in tests.
pub trait TokenSource: Send + Sync {
    /// Produce a new token.
    fn next_token(&self) -> String;
}

/// Tokens from the operating system RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn next_token(&self) -> String {
        generate_token()
    }
}

/// 256 random bits, URL-safe base64 without padding.
///
/// # Examples
///
/// ```
/// let token = sharegate::share::generate_token();
/// assert_eq!(token.len(), 43);
/// assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
/// ```
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether `token` could have come from [`generate_token`].
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

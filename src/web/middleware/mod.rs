//! Middleware for Web API.

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod security;

pub use auth::{jwt_auth, AuthUser, OptionalAuthUser};
pub use cors::create_cors_layer;
pub use rate_limit::{auth_rate_limit, download_rate_limit, RateLimitState};
pub use security::security_headers;

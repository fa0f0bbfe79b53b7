//! HTTP surface for sharegate.
//!
//! A JSON API under `/api` for accounts, files and share links, plus the
//! public share download endpoint, a health check and Swagger UI.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_router, ApiDoc};
pub use server::WebServer;

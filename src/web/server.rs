//! HTTP server for sharegate.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::config::Config;
use crate::db::{RefreshTokenRepository, VerificationTokenRepository};
use crate::file::BlobStore;
use crate::notify::NotificationQueue;
use crate::{Database, Result, SharegateError};

use super::handlers::AppState;
use super::middleware::RateLimitState;
use super::router::{create_health_router, create_router, create_swagger_router};

/// Token cleanup interval: 1 hour.
const CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Web server for the API.
pub struct WebServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
    rate_limits: Arc<RateLimitState>,
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(
        config: &Config,
        db: Arc<Database>,
        blobs: Arc<dyn BlobStore>,
        notifications: NotificationQueue,
    ) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| SharegateError::Config(format!("invalid server address: {e}")))?;

        let app_state = AppState::from_config(config, db, blobs, notifications);
        let rate_limits = RateLimitState::new(
            config.web.auth_rate_limit,
            config.web.download_rate_limit,
        );

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            rate_limits: Arc::new(rate_limits),
            cors_origins: config.web.cors_origins.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The full application: API, health check and Swagger UI.
    pub fn router(&self) -> Router {
        create_router(
            self.app_state.clone(),
            self.rate_limits.clone(),
            &self.cors_origins,
        )
        .merge(create_health_router())
        .merge(create_swagger_router())
        .layer(CompressionLayer::new())
    }

    /// Start the token cleanup background task.
    ///
    /// Runs hourly and removes expired or revoked refresh tokens and
    /// expired verification tokens. Share links are never swept.
    fn start_token_cleanup_task(db: Arc<Database>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;

                match RefreshTokenRepository::new(db.pool()).cleanup_expired().await {
                    Ok(count) if count > 0 => {
                        tracing::info!(deleted_count = count, "Cleaned up expired/revoked refresh tokens");
                    }
                    Ok(_) => tracing::debug!("No expired refresh tokens to clean up"),
                    Err(e) => tracing::warn!(error = %e, "Failed to cleanup refresh tokens"),
                }

                match VerificationTokenRepository::new(db.pool()).cleanup_expired().await {
                    Ok(count) if count > 0 => {
                        tracing::info!(deleted_count = count, "Cleaned up expired verification tokens");
                    }
                    Ok(_) => tracing::debug!("No expired verification tokens to clean up"),
                    Err(e) => tracing::warn!(error = %e, "Failed to cleanup verification tokens"),
                }
            }
        });
    }

    async fn bind(self) -> Result<(TcpListener, Router)> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;

        Self::start_token_cleanup_task(self.app_state.db.clone());
        self.rate_limits.clone().start_cleanup_task();
        tracing::info!("Token cleanup task started (runs every hour)");

        Ok((listener, router))
    }

    /// Run the web server until it fails.
    pub async fn run(self) -> Result<()> {
        let (listener, router) = self.bind().await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let (listener, router) = self.bind().await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::MemoryBlobStore;

    fn create_test_config() -> Config {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.web.jwt_secret = "test-secret-key".to_string();
        config
    }

    async fn create_test_server(config: &Config) -> WebServer {
        let db = Database::open_in_memory().await.unwrap();
        WebServer::new(
            config,
            Arc::new(db),
            Arc::new(MemoryBlobStore::new()),
            NotificationQueue::disabled(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_web_server_new() {
        let server = create_test_server(&create_test_config()).await;
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_web_server_rejects_bad_address() {
        let mut config = create_test_config();
        config.server.host = "not an address".to_string();
        let db = Database::open_in_memory().await.unwrap();
        let result = WebServer::new(
            &config,
            Arc::new(db),
            Arc::new(MemoryBlobStore::new()),
            NotificationQueue::disabled(),
        );
        assert!(matches!(result, Err(SharegateError::Config(_))));
    }

    #[tokio::test]
    async fn test_web_server_run() {
        let server = create_test_server(&create_test_config()).await;
        let addr = server.run_with_addr().await.unwrap();

        let client = reqwest::Client::new();
        let resp = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap();

        assert!(resp.status().is_success());
        assert_eq!(resp.text().await.unwrap(), "OK");

        let resp = client
            .get(format!("http://{}/api-docs/openapi.json", addr))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
    }
}

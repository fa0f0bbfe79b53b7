//! Test helpers for Web API integration tests.
//!
//! Provides an in-process server over an in-memory database and in-memory
//! blob store, plus helpers for accounts, uploads and share links.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderValue;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};

use sharegate::auth::{RegistrationRequest, RegistrationService};
use sharegate::db::Role;
use sharegate::web::WebServer;
use sharegate::{BlobStore, Config, Database, MemoryBlobStore, NotificationQueue};

/// Password used for every test account.
pub const TEST_PASSWORD: &str = "password123";

/// MIME type of .docx uploads.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Create a test configuration.
///
/// Rate limits are raised because every request made through `TestServer`
/// shares the same client key.
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.web.jwt_secret = "test-secret-key-for-testing-only".to_string();
    config.web.auth_rate_limit = 1000;
    config.web.download_rate_limit = 1000;
    config.share.public_base_url = "https://share.example.com".to_string();
    config.files.max_upload_size_mb = 1;
    config
}

/// Handles kept alive for the lifetime of a test.
pub struct TestApp {
    pub server: TestServer,
    pub db: Arc<Database>,
    pub blobs: Arc<MemoryBlobStore>,
}

/// Create a test server from the given configuration.
pub async fn create_test_app_with(config: Config) -> TestApp {
    let db = Arc::new(
        Database::open_in_memory()
            .await
            .expect("Failed to create test database"),
    );
    let blobs = Arc::new(MemoryBlobStore::new());
    let store: Arc<dyn BlobStore> = blobs.clone();

    let web = WebServer::new(&config, db.clone(), store, NotificationQueue::disabled())
        .expect("Failed to create web server");
    let server = TestServer::new(web.router()).expect("Failed to create test server");

    TestApp { server, db, blobs }
}

/// Create a test server with the default test configuration.
pub async fn create_test_app() -> TestApp {
    create_test_app_with(create_test_config()).await
}

/// `Authorization` header value for a token.
pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).expect("valid header value")
}

/// Register a client through the API and return the response body.
pub async fn register_client(server: &TestServer, email: &str) -> Value {
    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "email": email,
            "password": TEST_PASSWORD,
            "first_name": "Test",
            "last_name": "Client"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()
}

/// Create an operations account directly, the way the CLI does.
pub async fn create_operations_user(db: &Database, email: &str) -> i64 {
    let notifications = NotificationQueue::disabled();
    RegistrationService::new(db, &notifications, "http://localhost:3000")
        .register_with_role(RegistrationRequest::new(email, TEST_PASSWORD), Role::Operations)
        .await
        .expect("Failed to create operations user")
        .id
}

/// Log in and return the response body.
pub async fn login(server: &TestServer, email: &str) -> Value {
    let response = server
        .post("/api/auth/login")
        .json(&json!({
            "email": email,
            "password": TEST_PASSWORD
        }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

/// Get access token from a login response.
pub fn get_access_token(response: &Value) -> String {
    response["data"]["access_token"]
        .as_str()
        .expect("access_token in response")
        .to_string()
}

/// Get refresh token from a login response.
pub fn get_refresh_token(response: &Value) -> String {
    response["data"]["refresh_token"]
        .as_str()
        .expect("refresh_token in response")
        .to_string()
}

/// Register a client and return its access token.
pub async fn client_token(server: &TestServer, email: &str) -> String {
    register_client(server, email).await;
    get_access_token(&login(server, email).await)
}

/// Create an operations user and return its access token.
pub async fn operations_token(app: &TestApp, email: &str) -> String {
    create_operations_user(&app.db, email).await;
    get_access_token(&login(&app.server, email).await)
}

/// Minimal bytes that look like an Office (zip) container.
pub fn office_bytes(marker: &str) -> Vec<u8> {
    let mut bytes = b"PK\x03\x04".to_vec();
    bytes.extend_from_slice(marker.as_bytes());
    bytes
}

/// Multipart form with a file part and optional description.
pub fn upload_form(filename: &str, content: Vec<u8>, description: Option<&str>) -> MultipartForm {
    let part = Part::bytes(content)
        .file_name(filename.to_string())
        .mime_type(DOCX_MIME);
    let form = MultipartForm::new().add_part("file", part);
    match description {
        Some(description) => form.add_text("description", description.to_string()),
        None => form,
    }
}

/// Upload a file and return its ID.
pub async fn upload_file(server: &TestServer, token: &str, filename: &str, content: Vec<u8>) -> i64 {
    let response = server
        .post("/api/files")
        .add_header(AUTHORIZATION, bearer(token))
        .multipart(upload_form(filename, content, None))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["data"]["id"]
        .as_i64()
        .expect("file id in response")
}

/// Issue a share link and return the `data` object.
pub async fn share_file(server: &TestServer, token: &str, file_id: i64, body: Value) -> Value {
    let response = server
        .post(&format!("/api/files/{}/share", file_id))
        .add_header(AUTHORIZATION, bearer(token))
        .json(&body)
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["data"].clone()
}

/// Error code of an error response.
pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

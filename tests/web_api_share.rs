//! Web API Share Link Tests
//!
//! Integration tests for issuing, managing and downloading through share
//! links.

mod common;

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use chrono::{DateTime, FixedOffset};
use serde_json::{json, Value};

use common::{
    bearer, client_token, create_test_app, create_test_app_with, create_test_config, error_code,
    office_bytes, operations_token, share_file, upload_file, TestApp, DOCX_MIME,
};

fn parse_time(value: &Value) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value.as_str().expect("timestamp string"))
        .expect("RFC 3339 timestamp")
}

fn download_path(link: &Value) -> String {
    format!("/api/share/{}/download", link["token"].as_str().unwrap())
}

/// Operations user with one uploaded file.
async fn setup() -> (TestApp, String, i64) {
    let app = create_test_app().await;
    let token = operations_token(&app, "ops@example.com").await;
    let file_id = upload_file(&app.server, &token, "Q3 plan.docx", office_bytes("plan")).await;
    (app, token, file_id)
}

// ============================================================================
// Issue Tests
// ============================================================================

#[tokio::test]
async fn test_issue_with_defaults() {
    let (app, token, file_id) = setup().await;

    let link = share_file(&app.server, &token, file_id, json!({})).await;

    let share_token = link["token"].as_str().unwrap();
    assert_eq!(share_token.len(), 43);
    assert_eq!(
        link["share_url"],
        format!("https://share.example.com/api/share/{}/download", share_token)
    );
    assert_eq!(link["file_id"], file_id);
    assert_eq!(link["download_count"], 0);
    assert_eq!(link["is_active"], true);
    assert!(link["max_downloads"].is_null());
    assert!(link["remaining_downloads"].is_null());

    // Default lifetime is seven days.
    let lifetime = parse_time(&link["expires_at"]) - parse_time(&link["created_at"]);
    assert!((lifetime.num_seconds() - 7 * 24 * 3600).abs() <= 5);
}

#[tokio::test]
async fn test_issue_without_body() {
    let (app, token, file_id) = setup().await;

    let response = app
        .server
        .post(&format!("/api/files/{}/share", file_id))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status(StatusCode::CREATED);
    assert!(response.json::<Value>()["data"]["expires_at"].is_string());
}

#[tokio::test]
async fn test_issue_with_limits() {
    let (app, token, file_id) = setup().await;

    let link = share_file(
        &app.server,
        &token,
        file_id,
        json!({ "expires_in_days": 2, "max_downloads": 3 }),
    )
    .await;

    assert_eq!(link["max_downloads"], 3);
    assert_eq!(link["remaining_downloads"], 3);
    let lifetime = parse_time(&link["expires_at"]) - parse_time(&link["created_at"]);
    assert!((lifetime.num_seconds() - 2 * 24 * 3600).abs() <= 5);
}

#[tokio::test]
async fn test_issue_without_expiry() {
    let (app, token, file_id) = setup().await;

    let link = share_file(&app.server, &token, file_id, json!({ "no_expiry": true })).await;

    assert!(link["expires_at"].is_null());
}

#[tokio::test]
async fn test_issue_rejects_conflicting_lifetime() {
    let (app, token, file_id) = setup().await;

    let response = app
        .server
        .post(&format!("/api/files/{}/share", file_id))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "no_expiry": true, "expires_in_days": 3 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_issue_rejects_invalid_values() {
    let (app, token, file_id) = setup().await;

    for body in [
        json!({ "max_downloads": 0 }),
        json!({ "expires_in_days": 0 }),
        json!({ "ttl_seconds": -5 }),
    ] {
        let response = app
            .server
            .post(&format!("/api/files/{}/share", file_id))
            .add_header(AUTHORIZATION, bearer(&token))
            .json(&body)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_issue_rejects_oversized_lifetime() {
    let (app, token, file_id) = setup().await;

    for body in [
        json!({ "ttl_seconds": i64::MAX }),
        json!({ "ttl_seconds": 1_000_000_000_000i64 }),
        json!({ "ttl_seconds": 315_360_001 }),
        json!({ "expires_in_days": 100_000 }),
        json!({ "expires_in_days": i64::MAX }),
    ] {
        let response = app
            .server
            .post(&format!("/api/files/{}/share", file_id))
            .add_header(AUTHORIZATION, bearer(&token))
            .json(&body)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // Nothing was issued along the way.
    let response = app
        .server
        .get("/api/share-links")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_issue_accepts_ten_year_ttl() {
    let (app, token, file_id) = setup().await;

    let link = share_file(
        &app.server,
        &token,
        file_id,
        json!({ "ttl_seconds": 315_360_000 }),
    )
    .await;

    let created = parse_time(&link["created_at"]);
    let expires = parse_time(&link["expires_at"]);
    assert!(expires - created >= chrono::Duration::days(3649));
}

#[tokio::test]
async fn test_issue_unknown_file() {
    let (app, token, _file_id) = setup().await;

    let response = app
        .server
        .post("/api/files/99999/share")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_issue_forbidden_for_client() {
    let (app, _token, file_id) = setup().await;
    let client = client_token(&app.server, "client@example.com").await;

    let response = app
        .server
        .post(&format!("/api/files/{}/share", file_id))
        .add_header(AUTHORIZATION, bearer(&client))
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_issued_tokens_are_distinct() {
    let (app, token, file_id) = setup().await;

    let first = share_file(&app.server, &token, file_id, json!({})).await;
    let second = share_file(&app.server, &token, file_id, json!({})).await;

    assert_ne!(first["token"], second["token"]);
}

// ============================================================================
// Download Tests
// ============================================================================

#[tokio::test]
async fn test_download_anonymous() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({})).await;

    let response = app.server.get(&download_path(&link)).await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), office_bytes("plan").as_slice());
    assert_eq!(response.header(CONTENT_TYPE), DOCX_MIME);
    assert_eq!(
        response.header(CONTENT_DISPOSITION),
        "attachment; filename=\"Q3 plan.docx\""
    );
    assert_eq!(response.header("cache-control"), "no-store");
    assert_eq!(response.header("referrer-policy"), "no-referrer");
}

#[tokio::test]
async fn test_download_as_client() {
    let (app, token, file_id) = setup().await;
    let client = client_token(&app.server, "client@example.com").await;
    let link = share_file(&app.server, &token, file_id, json!({})).await;

    let response = app
        .server
        .get(&download_path(&link))
        .add_header(AUTHORIZATION, bearer(&client))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_download_limit_reached() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({ "max_downloads": 1 })).await;

    let response = app.server.get(&download_path(&link)).await;
    response.assert_status_ok();
    assert_eq!(
        response.header(CONTENT_DISPOSITION),
        "attachment; filename=\"Q3 plan.docx\""
    );

    let response = app.server.get(&download_path(&link)).await;
    response.assert_status(StatusCode::GONE);
    assert_eq!(error_code(&response.json::<Value>()), "LIMIT_REACHED");
}

#[tokio::test]
async fn test_download_expired() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({ "ttl_seconds": 1 })).await;

    tokio::time::sleep(Duration::from_secs(2)).await;

    let response = app.server.get(&download_path(&link)).await;
    response.assert_status(StatusCode::GONE);
    assert_eq!(error_code(&response.json::<Value>()), "EXPIRED");
}

#[tokio::test]
async fn test_download_deactivated() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({})).await;

    let response = app
        .server
        .post(&format!("/api/share-links/{}/deactivate", link["id"]))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["is_active"], false);

    let response = app.server.get(&download_path(&link)).await;
    response.assert_status(StatusCode::GONE);
    assert_eq!(error_code(&response.json::<Value>()), "DEACTIVATED");
}

#[tokio::test]
async fn test_download_unknown_token() {
    let app = create_test_app().await;

    let response = app
        .server
        .get("/api/share/AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA/download")
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(error_code(&response.json::<Value>()), "NOT_FOUND");
}

#[tokio::test]
async fn test_download_malformed_token() {
    let app = create_test_app().await;

    for token in [
        "short",
        "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA!",
    ] {
        let response = app
            .server
            .get(&format!("/api/share/{}/download", token))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(error_code(&response.json::<Value>()), "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_download_refused_for_operations_without_consuming() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({ "max_downloads": 1 })).await;

    let response = app
        .server
        .get(&download_path(&link))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = app
        .server
        .get(&format!("/api/share-links/{}", link["id"]))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["download_count"], 0);

    // The slot is still there for a client.
    let response = app.server.get(&download_path(&link)).await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_download_with_invalid_bearer_is_anonymous() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({})).await;

    let response = app
        .server
        .get(&download_path(&link))
        .add_header(AUTHORIZATION, bearer("not.a.jwt"))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_download_counts_tracked() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({ "max_downloads": 5 })).await;

    for _ in 0..2 {
        app.server.get(&download_path(&link)).await.assert_status_ok();
    }

    let response = app
        .server
        .get(&format!("/api/share-links/{}", link["id"]))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"]["download_count"], 2);
    assert_eq!(body["data"]["remaining_downloads"], 3);
}

#[tokio::test]
async fn test_download_rate_limited() {
    let mut config = create_test_config();
    config.web.download_rate_limit = 2;
    let app = create_test_app_with(config).await;
    let token = operations_token(&app, "ops@example.com").await;
    let file_id = upload_file(&app.server, &token, "plan.docx", office_bytes("x")).await;
    let link = share_file(&app.server, &token, file_id, json!({})).await;

    app.server.get(&download_path(&link)).await.assert_status_ok();
    app.server.get(&download_path(&link)).await.assert_status_ok();

    let response = app.server.get(&download_path(&link)).await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_code(&response.json::<Value>()), "TOO_MANY_REQUESTS");
}

// ============================================================================
// Management Tests
// ============================================================================

#[tokio::test]
async fn test_extend_link() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({ "expires_in_days": 1 })).await;
    let before = parse_time(&link["expires_at"]);

    let response = app
        .server
        .post(&format!("/api/share-links/{}/extend", link["id"]))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "days": 3 }))
        .await;
    response.assert_status_ok();

    let after = parse_time(&response.json::<Value>()["data"]["expires_at"]);
    assert_eq!((after - before).num_days(), 3);
}

#[tokio::test]
async fn test_extend_link_default_days() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({ "expires_in_days": 1 })).await;
    let before = parse_time(&link["expires_at"]);

    let response = app
        .server
        .post(&format!("/api/share-links/{}/extend", link["id"]))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();

    let after = parse_time(&response.json::<Value>()["data"]["expires_at"]);
    assert_eq!((after - before).num_days(), 7);
}

#[tokio::test]
async fn test_extend_revives_expired_link() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({ "ttl_seconds": 1 })).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let response = app
        .server
        .post(&format!("/api/share-links/{}/extend", link["id"]))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "days": 1 }))
        .await;
    response.assert_status_ok();

    app.server.get(&download_path(&link)).await.assert_status_ok();
}

#[tokio::test]
async fn test_extend_rejects_invalid_days() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({})).await;

    let response = app
        .server
        .post(&format!("/api/share-links/{}/extend", link["id"]))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "days": 0 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_extend_rejects_oversized_days() {
    let (app, token, file_id) = setup().await;
    let link = share_file(&app.server, &token, file_id, json!({})).await;

    for body in [json!({ "days": 100_000 }), json!({ "days": i64::MAX })] {
        let response = app
            .server
            .post(&format!("/api/share-links/{}/extend", link["id"]))
            .add_header(AUTHORIZATION, bearer(&token))
            .json(&body)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // The stored expiry is untouched.
    let response = app
        .server
        .get(&format!("/api/share-links/{}", link["id"]))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["expires_at"], link["expires_at"]);
}

#[tokio::test]
async fn test_manage_link_forbidden_for_client() {
    let (app, token, file_id) = setup().await;
    let client = client_token(&app.server, "client@example.com").await;
    let link = share_file(&app.server, &token, file_id, json!({})).await;

    for path in [
        format!("/api/share-links/{}/deactivate", link["id"]),
        format!("/api/share-links/{}/extend", link["id"]),
    ] {
        let response = app
            .server
            .post(&path)
            .add_header(AUTHORIZATION, bearer(&client))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    let response = app
        .server
        .get(&format!("/api/share-links/{}", link["id"]))
        .add_header(AUTHORIZATION, bearer(&client))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_get_link_not_found() {
    let (app, token, _file_id) = setup().await;

    let response = app
        .server
        .get("/api/share-links/99999")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_links() {
    let (app, token, file_id) = setup().await;
    let other = operations_token(&app, "ops2@example.com").await;
    let client = client_token(&app.server, "client@example.com").await;

    share_file(&app.server, &token, file_id, json!({})).await;
    share_file(&app.server, &other, file_id, json!({})).await;

    // Operations users see every link.
    let response = app
        .server
        .get("/api/share-links")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 2);

    let response = app
        .server
        .get("/api/share-links")
        .add_header(AUTHORIZATION, bearer(&client))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_list_links_for_file() {
    let (app, token, file_id) = setup().await;
    let other_file = upload_file(&app.server, &token, "other.pptx", office_bytes("o")).await;

    share_file(&app.server, &token, file_id, json!({})).await;
    share_file(&app.server, &token, file_id, json!({ "max_downloads": 2 })).await;
    share_file(&app.server, &token, other_file, json!({})).await;

    let response = app
        .server
        .get(&format!("/api/files/{}/share-links", file_id))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let links = response.json::<Value>()["data"].as_array().unwrap().clone();
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|link| link["file_id"] == file_id));
}

#[tokio::test]
async fn test_openapi_document() {
    let app = create_test_app().await;

    let response = app.server.get("/api-docs/openapi.json").await;

    response.assert_status_ok();
    let doc: Value = response.json();
    assert!(doc["paths"]["/api/share/{token}/download"]["get"].is_object());
}

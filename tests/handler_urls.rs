mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use shortkeep::domain::expiration_listener::ListenerState;

fn make_server(ctx: &common::TestContext) -> TestServer {
    TestServer::new(common::test_router(ctx.state.clone())).unwrap()
}

async fn create(server: &TestServer, user: &str, body: Value) -> Value {
    let response = server
        .post("/api/urls")
        .add_header("x-user-id", user)
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

// ─── CREATE ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_url_success() {
    let ctx = common::test_context();
    let server = make_server(&ctx);

    let json = create(
        &server,
        "7",
        json!({ "original_url": "https://example.com/a", "expire_time": 2 }),
    )
    .await;

    let code = json["short_code"].as_str().unwrap();
    assert_eq!(code.len(), 5);
    assert_eq!(json["short_url"], format!("{}/{}", common::BASE_URL, code));
    assert_eq!(json["is_active"], true);
    assert_eq!(ctx.repository.len(), 1);
}

#[tokio::test]
async fn test_create_url_with_custom_code() {
    let ctx = common::test_context();
    let server = make_server(&ctx);

    let json = create(
        &server,
        "7",
        json!({
            "original_url": "https://example.com/a",
            "expire_time": 2,
            "custom_short_url": "my-link"
        }),
    )
    .await;
    assert_eq!(json["short_code"], "my-link");

    let response = server
        .post("/api/urls")
        .add_header("x-user-id", "8")
        .json(&json!({
            "original_url": "https://example.com/b",
            "expire_time": 2,
            "custom_short_url": "my-link"
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(
        response.json::<Value>()["error"]["code"],
        "duplicate_short_code"
    );
}

#[tokio::test]
async fn test_create_url_invalid_custom_code() {
    let ctx = common::test_context();
    let server = make_server(&ctx);

    let response = server
        .post("/api/urls")
        .add_header("x-user-id", "7")
        .json(&json!({
            "original_url": "https://example.com/a",
            "expire_time": 2,
            "custom_short_url": "ab"
        }))
        .await;

    response.assert_status_bad_request();
    assert_eq!(
        response.json::<Value>()["error"]["code"],
        "invalid_custom_code"
    );
    assert!(ctx.repository.is_empty());
}

#[tokio::test]
async fn test_create_url_validation_error() {
    let ctx = common::test_context();
    let server = make_server(&ctx);

    let response = server
        .post("/api/urls")
        .add_header("x-user-id", "7")
        .json(&json!({ "original_url": "not a url", "expire_time": 0 }))
        .await;

    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_create_url_cache_down() {
    let ctx = common::test_context();
    ctx.cache.fail_writes(true);
    let server = make_server(&ctx);

    let response = server
        .post("/api/urls")
        .add_header("x-user-id", "7")
        .json(&json!({ "original_url": "https://example.com/a", "expire_time": 2 }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<Value>()["error"]["code"],
        "cache_write_failed"
    );
    assert!(ctx.repository.is_empty());
}

#[tokio::test]
async fn test_missing_user_header() {
    let ctx = common::test_context();
    let server = make_server(&ctx);

    let response = server
        .post("/api/urls")
        .json(&json!({ "original_url": "https://example.com/a", "expire_time": 2 }))
        .await;

    response.assert_status_unauthorized();
    assert_eq!(response.json::<Value>()["error"]["code"], "unauthorized");
}

// ─── LIST ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_urls_scoped_to_caller() {
    let ctx = common::test_context();
    common::create_link(&ctx, 7, "https://example.com/a", 1).await;
    common::create_link(&ctx, 7, "https://example.com/b", 1).await;
    common::create_link(&ctx, 8, "https://example.com/c", 1).await;
    let server = make_server(&ctx);

    let response = server
        .get("/api/urls")
        .add_query_param("limit", 1)
        .add_header("x-user-id", "7")
        .await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["urls"].as_array().unwrap().len(), 1);
    assert_eq!(json["pagination"]["total_count"], 2);
    assert_eq!(json["pagination"]["has_next"], true);
}

#[tokio::test]
async fn test_list_urls_active_filter() {
    let ctx = common::test_context();
    let a = common::create_link(&ctx, 7, "https://example.com/a", 1).await;
    common::create_link(&ctx, 7, "https://example.com/b", 1).await;
    ctx.state
        .lifecycle_service
        .soft_delete(7, a.id)
        .await
        .unwrap();
    let server = make_server(&ctx);

    let response = server
        .get("/api/urls")
        .add_query_param("active", false)
        .add_header("x-user-id", "7")
        .await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    let urls = json["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0]["id"], a.id);
}

// ─── DELETE ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_url_success() {
    let ctx = common::test_context();
    let record = common::create_link(&ctx, 7, "https://example.com/a", 1).await;
    let server = make_server(&ctx);

    server
        .delete(&format!("/api/urls/{}", record.id))
        .add_header("x-user-id", "7")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .get(&format!("/{}", record.short_code))
        .await
        .assert_status_not_found();

    // Deleting again is a no-op.
    server
        .delete(&format!("/api/urls/{}", record.id))
        .add_header("x-user-id", "7")
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_delete_foreign_url_forbidden() {
    let ctx = common::test_context();
    let record = common::create_link(&ctx, 7, "https://example.com/a", 1).await;
    let server = make_server(&ctx);

    let response = server
        .delete(&format!("/api/urls/{}", record.id))
        .add_header("x-user-id", "8")
        .await;

    response.assert_status_forbidden();
    assert!(ctx.repository.find(record.id).unwrap().is_active);
}

#[tokio::test]
async fn test_delete_unknown_url() {
    let ctx = common::test_context();
    let server = make_server(&ctx);

    server
        .delete("/api/urls/999")
        .add_header("x-user-id", "7")
        .await
        .assert_status_not_found();
}

// ─── EXTEND ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extend_expiry_success() {
    let ctx = common::test_context();
    let record = common::create_link(&ctx, 7, "https://example.com/a", 1).await;
    let server = make_server(&ctx);

    let response = server
        .post(&format!("/api/urls/{}/expiry", record.id))
        .add_header("x-user-id", "7")
        .json(&json!({ "hours": 4 }))
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["message"],
        "Expiry extended by 4 hours"
    );
    let stored = ctx.repository.find(record.id).unwrap();
    assert_eq!(
        stored.expires_at - record.expires_at,
        chrono::TimeDelta::hours(4)
    );
}

#[tokio::test]
async fn test_extend_expiry_out_of_range() {
    let ctx = common::test_context();
    let record = common::create_link(&ctx, 7, "https://example.com/a", 1).await;
    let server = make_server(&ctx);

    server
        .post(&format!("/api/urls/{}/expiry", record.id))
        .add_header("x-user-id", "7")
        .json(&json!({ "hours": 100 }))
        .await
        .assert_status_bad_request();

    assert_eq!(ctx.repository.find(record.id).unwrap(), record);
}

// ─── REDIRECT ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_redirect_success() {
    let ctx = common::test_context();
    let record = common::create_link(&ctx, 7, "https://example.com/a", 1).await;
    let server = make_server(&ctx);

    let response = server.get(&format!("/{}", record.short_code)).await;

    response.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.header("location"), "https://example.com/a");
}

#[tokio::test]
async fn test_redirect_unknown_code() {
    let ctx = common::test_context();
    let server = make_server(&ctx);

    let response = server.get("/nope1").await;

    response.assert_status_not_found();
    assert_eq!(response.json::<Value>()["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_redirect_cache_down() {
    let ctx = common::test_context();
    let record = common::create_link(&ctx, 7, "https://example.com/a", 1).await;
    ctx.cache.fail_reads(true);
    let server = make_server(&ctx);

    server
        .get(&format!("/{}", record.short_code))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

// ─── HEALTH ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_ok() {
    let ctx = common::test_context();
    let server = make_server(&ctx);

    let response = server.get("/health").await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["expiration_listener"]["message"], "listening");
}

#[tokio::test]
async fn test_health_stopped_listener_still_healthy() {
    let ctx = common::test_context_with_listener(ListenerState::Stopped);
    let server = make_server(&ctx);

    let response = server.get("/health").await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["expiration_listener"]["status"], "error");
}

#[tokio::test]
async fn test_health_cache_down() {
    let ctx = common::test_context();
    ctx.cache.fail_reads(true);
    let server = make_server(&ctx);

    let response = server.get("/health").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["status"], "degraded");
}

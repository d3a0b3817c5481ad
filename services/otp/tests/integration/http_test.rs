use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use codegate_otp::router::build_router;

use crate::helpers::{Harness, harness};

fn server(h: &Harness) -> TestServer {
    TestServer::new(build_router(h.state.clone())).unwrap()
}

#[tokio::test]
async fn request_should_issue_code_and_hide_it_outside_debug() {
    let h = harness(false);
    let server = server(&h);

    let resp = server
        .post("/code/request")
        .json(&json!({ "email": "alice@example.com" }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let body: Value = resp.json();
    assert_eq!(body["valid_for_secs"], 15);
    assert_eq!(body["message"], "access code sent by email");
    assert!(body.get("code").is_none(), "raw code leaked: {body}");

    let sent = h.notifier.wait_for(1).await;
    assert_eq!(sent[0].to, "alice@example.com");
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn request_without_body_should_issue_anonymous_code() {
    let h = harness(true);
    let server = server(&h);

    let resp = server.post("/code/request").await;
    resp.assert_status(StatusCode::CREATED);
    let body: Value = resp.json();
    assert_eq!(body["message"], "access code issued");
    let code = body["code"].as_str().unwrap().to_owned();
    assert_eq!(code.len(), 9);

    let rows = h.store.active_codes();
    assert_eq!(rows[0].requester, "anonymous");
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn request_should_reject_bad_email() {
    let h = harness(false);
    let server = server(&h);

    let resp = server
        .post("/code/request")
        .json(&json!({ "email": "not-an-address" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["kind"], "INVALID_EMAIL");
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn request_should_reject_garbled_body() {
    let h = harness(false);
    let server = server(&h);

    let resp = server.post("/code/request").text("{email:").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["kind"], "INVALID_BODY");
}

#[tokio::test]
async fn validate_should_grant_then_deny_reuse() {
    let h = harness(true);
    let server = server(&h);

    let issued: Value = server.post("/code/request").await.json();
    let code = issued["code"].as_str().unwrap().to_owned();

    let first = server
        .post("/code/validate")
        .json(&json!({ "code": code }))
        .await;
    first.assert_status_ok();
    let body: Value = first.json();
    assert_eq!(body["granted"], true);
    assert!(body.get("reason").is_none());

    let second: Value = server
        .post("/code/validate")
        .json(&json!({ "code": code }))
        .await
        .json();
    assert_eq!(second["granted"], false);
    assert_eq!(second["reason"], "invalid");
}

#[tokio::test]
async fn validate_should_report_expired_code() {
    let h = harness(true);
    let server = server(&h);

    let issued: Value = server.post("/code/request").await.json();
    h.clock.advance(20);

    let resp = server
        .post("/code/validate")
        .json(&json!({ "code": issued["code"] }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["granted"], false);
    assert_eq!(body["reason"], "expired");
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn validate_should_reject_malformed_code() {
    let h = harness(false);
    let server = server(&h);

    let resp = server
        .post("/code/validate")
        .json(&json!({ "code": "12345" }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["granted"], false);
    assert_eq!(body["reason"], "malformed");
    assert_eq!(body["message"], "access code must be exactly 9 digits");
}

#[tokio::test]
async fn validate_should_answer_json_for_wrongly_typed_code() {
    let h = harness(false);
    let server = server(&h);

    let resp = server
        .post("/code/validate")
        .json(&json!({ "code": 123456789 }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["kind"], "INVALID_BODY");

    let missing: Value = server.post("/code/validate").text("{}").await.json();
    assert_eq!(missing["kind"], "INVALID_BODY");
}

#[tokio::test]
async fn health_should_count_active_codes() {
    let h = harness(false);
    let server = server(&h);
    server.post("/code/request").await;
    server.post("/code/request").await;

    let body: Value = server.get("/health").await.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_codes"], 2);
    assert!(body["uptime_secs"].is_u64());

    server.get("/healthz").await.assert_status_ok();
    server.get("/readyz").await.assert_status_ok();
}

#[tokio::test]
async fn debug_listing_should_only_exist_in_debug_mode() {
    let h = harness(false);
    server(&h)
        .get("/debug/codes")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let h = harness(true);
    let server = server(&h);
    server
        .post("/code/request")
        .json(&json!({ "email": "bob@example.com" }))
        .await;
    let rows: Value = server.get("/debug/codes").await.json();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["requester"], "bob@example.com");
    assert_eq!(rows[0]["remaining_secs"], 15);
}

#[tokio::test]
async fn responses_should_carry_request_id() {
    let h = harness(false);
    let resp = server(&h).get("/healthz").await;
    let id = resp.header("x-request-id");
    assert!(!id.is_empty());
}

//! CLI integration tests against a mocked API.

mod common;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{TestHome, run_cli, stderr, stdout};

fn alice() -> serde_json::Value {
    json!({"id": "u1", "username": "alice", "role": "admin", "isVerified": true})
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_then_whoami() {
    let server = MockServer::start().await;
    let home = TestHome::new();

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"identifier": "alice", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "access-1",
            "refreshToken": "refresh-1",
            "user": alice()
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": alice()})))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_cli(
        &["login", "--identifier", "alice", "--password", "hunter2"],
        &home,
        &server.uri(),
    )
    .await;
    assert!(output.status.success(), "login failed: {}", stderr(&output));
    assert!(stdout(&output).contains("alice"));
    assert_eq!(
        home.stored_tokens(),
        Some(("access-1".to_string(), "refresh-1".to_string()))
    );

    let output = run_cli(&["whoami"], &home, &server.uri()).await;
    assert!(output.status.success(), "whoami failed: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("alice"));
    assert!(out.contains("admin"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_failure_keeps_no_tokens() {
    let server = MockServer::start().await;
    let home = TestHome::new();

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Invalid password"
        })))
        .mount(&server)
        .await;

    let output = run_cli(
        &["login", "--identifier", "alice", "--password", "nope"],
        &home,
        &server.uri(),
    )
    .await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid password"));
    assert!(home.stored_tokens().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_whoami_without_session() {
    let server = MockServer::start().await;
    let home = TestHome::new();

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice()))
        .expect(0)
        .mount(&server)
        .await;

    let output = run_cli(&["whoami"], &home, &server.uri()).await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("No active session"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_request_refreshes_stored_tokens() {
    let server = MockServer::start().await;
    let home = TestHome::new();
    home.seed_tokens("old-access", "old-refresh");

    Mock::given(method("GET"))
        .and(path("/videos/trending"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/videos/trending"))
        .and(header("authorization", "Bearer new-access"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "v1", "title": "First"},
            {"id": "v2", "title": "Second"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .and(header("authorization", "Bearer old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "new-access",
            "refreshToken": "new-refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_cli(
        &["request", "get", "/videos/trending", "--query", "limit=2"],
        &home,
        &server.uri(),
    )
    .await;

    assert!(output.status.success(), "request failed: {}", stderr(&output));
    assert!(stdout(&output).contains("Second"));
    assert_eq!(
        home.stored_tokens(),
        Some(("new-access".to_string(), "new-refresh".to_string()))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_request_with_expired_session() {
    let server = MockServer::start().await;
    let home = TestHome::new();
    home.seed_tokens("old-access", "dead-refresh");

    Mock::given(method("POST"))
        .and(path("/videos/v1/like"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_cli(
        &["request", "post", "/videos/v1/like", "--data", "{}"],
        &home,
        &server.uri(),
    )
    .await;

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Session expired"));
    assert!(err.contains("tubekit login"));
    assert!(home.stored_tokens().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_whoami_with_expired_session_reports_once() {
    let server = MockServer::start().await;
    let home = TestHome::new();
    home.seed_tokens("old-access", "dead-refresh");

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_cli(&["whoami"], &home, &server.uri()).await;

    assert!(!output.status.success());
    let err = stderr(&output);
    assert_eq!(err.matches("Session expired").count(), 1, "stderr: {err}");
    assert!(err.contains("tubekit login"));
    assert!(home.stored_tokens().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_logout_clears_tokens() {
    let server = MockServer::start().await;
    let home = TestHome::new();
    home.seed_tokens("access-1", "refresh-1");

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_cli(&["logout"], &home, &server.uri()).await;
    assert!(output.status.success(), "logout failed: {}", stderr(&output));
    assert!(home.stored_tokens().is_none());

    // Already logged out: succeeds without calling the server again
    let output = run_cli(&["logout"], &home, &server.uri()).await;
    assert!(output.status.success());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_api_url_is_rejected() {
    let home = TestHome::new();

    let output = run_cli(&["whoami"], &home, "http://videos.example.com").await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid API URL"));
}

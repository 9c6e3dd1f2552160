//! `POST /process` and `GET /health` through the full router.

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use vigil_core::{AuditAction, MessageStatus, Span};
use vigil_release::{RateLimitConfig, ReleaseEngine};
use vigil_server::config::ServerConfig;
use vigil_server::{router, ProcessResponse};
use vigil_testkit::TestHarness;

const CREDENTIAL: &str = "ops-credential";
const ALLOWED_ORIGIN: &str = "https://app.example.com";

fn server_config() -> ServerConfig {
    ServerConfig {
        allowed_origins: vec![ALLOWED_ORIGIN.to_string()],
        ..ServerConfig::default()
    }
}

fn app_with(harness: &TestHarness, limit: RateLimitConfig, config: &ServerConfig) -> Router {
    let engine = ReleaseEngine::new(harness.effects())
        .with_rate_limit(limit)
        .with_service_credential(Some(CREDENTIAL.to_string()));
    router(Arc::new(engine), config).layer(MockConnectInfo(SocketAddr::from((
        [198, 51, 100, 4],
        40_000,
    ))))
}

fn app(harness: &TestHarness) -> Router {
    app_with(harness, RateLimitConfig::default(), &server_config())
}

fn post() -> axum::http::request::Builder {
    Request::builder()
        .method(Method::POST)
        .uri("/process")
        .header(header::CONTENT_TYPE, "application/json")
}

async fn json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_routine_process_returns_counts() {
    let harness = TestHarness::new();
    let seeded = harness
        .configuration()
        .deadline_ago(Span::days(3))
        .grace(Span::days(1))
        .recipients(2)
        .messages(2)
        .seed()
        .await;

    let response = app(&harness)
        .oneshot(post().body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: ProcessResponse = serde_json::from_value(json(response).await).unwrap();
    assert!(body.success);
    assert_eq!(body.overdue_count, 1);
    assert_eq!(body.emergency_count, 0);
    assert_eq!(body.messages_released, 2);
    assert_eq!(body.message, "Processed 1 overdue configurations");

    let message = harness.store.message(seeded.message().id).await.unwrap();
    assert_eq!(message.status, MessageStatus::Sent);
}

#[tokio::test]
async fn test_response_uses_camel_case_fields() {
    let harness = TestHarness::new();
    let response = app(&harness)
        .oneshot(post().body(Body::from("{}")).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["overdueCount"], 0);
    assert_eq!(body["emergencyCount"], 0);
    assert_eq!(body["messagesReleased"], 0);
}

#[tokio::test]
async fn test_emergency_release_with_bearer_credential() {
    let harness = TestHarness::new();
    harness
        .configuration()
        .deadline_in(Span::days(5))
        .seed()
        .await;

    let response = app(&harness)
        .oneshot(
            post()
                .header(header::AUTHORIZATION, format!("Bearer {CREDENTIAL}"))
                .body(Body::from(r#"{"emergency_release":true}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["overdueCount"], 1);
    assert_eq!(body["emergencyCount"], 1);
    assert_eq!(harness.dispatch.sent().len(), 1);
}

#[tokio::test]
async fn test_emergency_release_with_wrong_credential_is_unauthorized() {
    let harness = TestHarness::new();
    let seeded = harness
        .configuration()
        .deadline_in(Span::days(5))
        .seed()
        .await;

    let response = app(&harness)
        .oneshot(
            post()
                .header(header::AUTHORIZATION, "Bearer not-it")
                .header(header::ORIGIN, ALLOWED_ORIGIN)
                .body(Body::from(r#"{"emergency_release":true}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "unauthorized");

    let audit = harness.store.audit_records().await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, AuditAction::UnauthorizedForcedRelease);
    assert_eq!(audit[0].origin.as_deref(), Some(ALLOWED_ORIGIN));
    assert_eq!(audit[0].metadata["caller"], "198.51.100.4");

    let message = harness.store.message(seeded.message().id).await.unwrap();
    assert_eq!(message.status, MessageStatus::Scheduled);
}

#[tokio::test]
async fn test_missing_credential_is_unauthorized() {
    let harness = TestHarness::new();
    let response = app(&harness)
        .oneshot(
            post()
                .body(Body::from(r#"{"emergency_release":true}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let harness = TestHarness::new();
    let app = app_with(
        &harness,
        RateLimitConfig {
            max_requests: 2,
            ..RateLimitConfig::default()
        },
        &server_config(),
    );

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post().body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app
        .oneshot(post().body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "rate limit exceeded");
}

#[tokio::test]
async fn test_forwarded_for_keys_rate_limit_when_trusted() {
    let harness = TestHarness::new();
    let config = ServerConfig {
        trust_forwarded_for: true,
        ..server_config()
    };
    let app = app_with(
        &harness,
        RateLimitConfig {
            max_requests: 1,
            ..RateLimitConfig::default()
        },
        &config,
    );

    for client in ["203.0.113.1", "203.0.113.2"] {
        let response = app
            .clone()
            .oneshot(
                post()
                    .header("x-forwarded-for", format!("{client}, 10.0.0.1"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app
        .oneshot(
            post()
                .header("x-forwarded-for", "203.0.113.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_store_outage_returns_500() {
    let harness = TestHarness::new();
    harness.faults.fail_list_configurations();

    let response = app(&harness)
        .oneshot(post().body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("configuration table offline"));
}

#[tokio::test]
async fn test_malformed_body_returns_400() {
    let harness = TestHarness::new();
    let response = app(&harness)
        .oneshot(post().body(Body::from("{emergency")).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["success"], false);
}

#[tokio::test]
async fn test_health() {
    let harness = TestHarness::new();
    let response = app(&harness)
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_cors_preflight_allows_listed_origin() {
    let harness = TestHarness::new();
    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/process")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    };

    let response = app(&harness)
        .oneshot(preflight(ALLOWED_ORIGIN))
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        ALLOWED_ORIGIN
    );
    let methods = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"));
    assert!(!methods.contains("GET"));

    let response = app(&harness)
        .oneshot(preflight("https://evil.example.net"))
        .await
        .unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

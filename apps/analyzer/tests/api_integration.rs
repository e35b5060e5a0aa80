//! Integration tests for the HTTP API
//!
//! Runs the router against a local platform rooted in a temp directory.

use std::sync::Arc;

use analyzer::analysis::{AnalysisPipeline, PdftoppmConverter, RandomIds};
use analyzer::client::{PlatformClient, ReadinessSettings};
use analyzer::llm_client::LlmClient;
use analyzer::platform::local::LocalPlatform;
use analyzer::platform::{Identity, PlatformSlot};
use analyzer::routes::build_router;
use analyzer::state::AppState;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    client: Arc<PlatformClient>,
    _storage: TempDir,
}

async fn create_test_app() -> TestApp {
    let storage = tempfile::tempdir().unwrap();
    let identity = Identity {
        uid: "local:tester".to_string(),
        name: "tester".to_string(),
        email: "tester@localhost".to_string(),
    };
    let platform = LocalPlatform::open(storage.path(), identity, LlmClient::new("test-key".into()))
        .await
        .unwrap();

    let client = Arc::new(PlatformClient::new(
        Arc::new(PlatformSlot::with(platform)),
        ReadinessSettings::default(),
    ));
    client.initialize();
    assert!(client.wait_ready().await);
    client
        .auth()
        .subscribe()
        .wait_for(|s| !s.is_loading)
        .await
        .unwrap();

    let pipeline = Arc::new(AnalysisPipeline::new(
        &client,
        Arc::new(PdftoppmConverter::new("pdftoppm")),
        Arc::new(RandomIds),
    ));
    let router = build_router(AppState {
        client: client.clone(),
        pipeline,
    });

    TestApp {
        router,
        client,
        _storage: storage,
    }
}

async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app().await;

    let (status, json) = send(&app.router, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["platform_ready"], true);
}

#[tokio::test]
async fn test_session_starts_signed_out() {
    let app = create_test_app().await;

    let (status, json) = send(&app.router, "GET", "/api/v1/session").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["session"]["is_authenticated"], false);
    assert_eq!(json["session"]["is_loading"], false);
    assert_eq!(json["session"]["user"], Value::Null);
    assert_eq!(json["platform"], "ready");
    assert_eq!(json["global_error"], Value::Null);
}

#[tokio::test]
async fn test_sign_in_then_sign_out() {
    let app = create_test_app().await;

    let (status, json) = send(&app.router, "POST", "/api/v1/session/sign-in").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["session"]["is_authenticated"], true);
    assert_eq!(json["session"]["user"]["name"], "tester");

    let (_, json) = send(&app.router, "POST", "/api/v1/session/refresh").await;
    assert_eq!(json["session"]["user"]["uid"], "local:tester");

    let (status, json) = send(&app.router, "POST", "/api/v1/session/sign-out").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["session"]["is_authenticated"], false);
    assert_eq!(json["session"]["user"], Value::Null);
}

#[tokio::test]
async fn test_platform_error_is_reported_then_dismissed() {
    let app = create_test_app().await;

    // Refreshing while signed out makes the host reject `get_user`.
    let (_, json) = send(&app.router, "POST", "/api/v1/session/refresh").await;
    assert_eq!(json["global_error"], "Not signed in");
    assert_eq!(json["session"]["is_authenticated"], false);

    let (status, json) = send(&app.router, "DELETE", "/api/v1/session/error").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["global_error"], Value::Null);
    assert_eq!(app.client.global_error(), None);
}

#[tokio::test]
async fn test_resumes_require_sign_in() {
    let app = create_test_app().await;

    let (status, json) = send(&app.router, "GET", "/api/v1/resumes").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_list_and_get_stored_resume() {
    let app = create_test_app().await;
    send(&app.router, "POST", "/api/v1/session/sign-in").await;

    let id = "6f1c2a9e-8d7b-4c3a-9e2f-1a2b3c4d5e6f";
    let record = json!({
        "id": id,
        "resumePath": "/uploads/cv.pdf",
        "imagePath": "/uploads/cv.png",
        "companyName": "Acme",
        "jobTitle": "Engineer",
        "jobDescription": "Build things",
        "feedback": {"overallScore": 71}
    });
    app.client
        .kv()
        .set(&format!("resume:{id}"), &record.to_string())
        .await
        .unwrap();

    let (status, json) = send(&app.router, "GET", "/api/v1/resumes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["resumes"].as_array().unwrap().len(), 1);
    assert_eq!(json["resumes"][0]["companyName"], "Acme");

    let (status, json) = send(&app.router, "GET", &format!("/api/v1/resumes/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["feedback"]["overallScore"], 71);
}

#[tokio::test]
async fn test_missing_resume_is_not_found() {
    let app = create_test_app().await;
    send(&app.router, "POST", "/api/v1/session/sign-in").await;

    let (status, json) = send(
        &app.router,
        "GET",
        "/api/v1/resumes/00000000-0000-0000-0000-000000000000",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_analyze_without_file_fails_before_upload() {
    let app = create_test_app().await;
    send(&app.router, "POST", "/api/v1/session/sign-in").await;

    let boundary = "X-ANALYZER-BOUNDARY";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"company-name\"\r\n\r\n\
         Acme\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"job-title\"\r\n\r\n\
         Engineer\r\n\
         --{boundary}--\r\n"
    );
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/resumes/analyze")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, json) = read_json(response).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "ANALYSIS_FAILED");
    assert_eq!(json["error"]["message"], "Error: No file selected");

    let (_, json) = send(&app.router, "GET", "/api/v1/resumes").await;
    assert_eq!(json["resumes"].as_array().unwrap().len(), 0);
}

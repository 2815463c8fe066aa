//! Full router wired to the real clients, served against the fake upstream.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use codemetric::aggregator::Aggregator;
use codemetric::api::{create_router, AppState};

use crate::common::{spawn_fake_upstream, FakeUpstream};

async fn app() -> (Router, FakeUpstream) {
    let upstream = spawn_fake_upstream().await;
    let aggregator = Aggregator::from_config(&upstream.config()).unwrap();
    (create_router(AppState::new(aggregator)), upstream)
}

async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

#[tokio::test]
async fn gpa_end_to_end() {
    let (app, upstream) = app().await;
    let (status, body) = call(
        app,
        "/codescore/gpa/?instance_id=inst-1&user_email=alice@example.com&github_user=alice&github_repo=proj",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"user": "alice", "repo_name": "proj", "repo_id": "123", "gpa": "3.8"})
    );
    assert_eq!(upstream.token_lookups(), 1);
    // resolve + repo + snapshot
    assert_eq!(upstream.code_climate_hits(), 3);
}

#[tokio::test]
async fn gpa_untracked_repository() {
    let (app, _upstream) = app().await;
    let (status, body) = call(
        app,
        "/codescore/gpa/?instance_id=inst-1&github_user=bob&github_repo=none",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({"user": "bob", "repo_name": "none", "repo_id": "", "gpa": "-1"})
    );
}

#[tokio::test]
async fn gpa_validation_short_circuits() {
    let (app, upstream) = app().await;

    let (status, body) = call(app.clone(), "/codescore/gpa/?github_user=alice&github_repo=proj").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, Value::Null);

    let (status, body) = call(
        app,
        "/codescore/gpa/?instance_id=inst-1&github_user=alice&github_repo=%20%20",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Need to specify github_repo"}));

    assert_eq!(upstream.token_lookups(), 0);
    assert_eq!(upstream.code_climate_hits(), 0);
}

#[tokio::test]
async fn gpa_conversion_failure_is_reported_safely() {
    let (app, _upstream) = app().await;
    let (status, body) = call(
        app,
        "/codescore/gpa/?instance_id=inst-1&github_user=alice&github_repo=weird",
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "repository id not found"}));
}

#[tokio::test]
async fn token_service_failure_is_generic_500() {
    let (app, upstream) = app().await;
    let (status, body) = call(
        app,
        "/codescore/gpa/?instance_id=unknown&github_user=alice&github_repo=proj",
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "internal server error"}));
    assert_eq!(upstream.code_climate_hits(), 0);
}

#[tokio::test]
async fn coverage_history_end_to_end() {
    let (app, _upstream) = app().await;
    let (status, body) = call(
        app,
        "/codescore/coverage-history/?instance_id=inst-1&github_user=alice&github_repo=proj",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "user": "alice",
            "repo_name": "proj",
            "repo_id": "123",
            "coverage-history": [
                {"date": "2020-01-01", "pct": 80},
                {"date": "2020-02-01", "pct": 82.5}
            ]
        })
    );
}

#[tokio::test]
async fn coverage_history_empty() {
    let (app, _upstream) = app().await;
    let (status, body) = call(
        app,
        "/codescore/coverage-history/?instance_id=inst-1&github_user=alice&github_repo=bare",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["repo_id"], "456");
    assert_eq!(body["coverage-history"], json!([]));
}

#[tokio::test]
async fn coverage_history_without_repository_params() {
    let (app, upstream) = app().await;
    let (status, body) = call(app, "/codescore/coverage-history/?instance_id=inst-1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"user": "", "repo_name": "", "repo_id": "", "coverage-history": []})
    );
    // Lookups are still attempted.
    assert_eq!(upstream.token_lookups(), 1);
    assert_eq!(upstream.code_climate_hits(), 1);
}

#[tokio::test]
async fn coverage_history_requires_instance_id() {
    let (app, upstream) = app().await;
    let (status, _) = call(app, "/codescore/coverage-history/?github_user=alice").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(upstream.token_lookups(), 0);
}

#[tokio::test]
async fn health_ignores_parameters() {
    let (app, upstream) = app().await;
    let (status, body) = call(app, "/?instance_id=x&github_user=y").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("hello".to_string()));
    assert_eq!(upstream.token_lookups(), 0);
}

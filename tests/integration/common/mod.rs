//! Fake settings-management and Code Climate servers bound to localhost.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use codemetric::config::Config;

/// Token the fake settings service hands out for `inst-1`.
pub const TOKEN: &str = "tok-inst-1";

/// Requests seen by the fake servers.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    /// Query strings received by the token-storage endpoint.
    pub token_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    /// Number of Code Climate requests.
    pub code_climate_hits: Arc<Mutex<usize>>,
}

/// A running fake upstream.
pub struct FakeUpstream {
    /// Listen address.
    pub addr: SocketAddr,
    /// Requests seen so far.
    pub recorded: Recorded,
}

impl FakeUpstream {
    /// Config pointing both collaborators at this fake.
    pub fn config(&self) -> Config {
        Config {
            setting_manage_url: format!("http://{}/settings/", self.addr),
            code_climate_url: format!("http://{}/cc/v1", self.addr),
            http_timeout_ms: Some(5_000),
            metrics_enabled: false,
            ..Config::default()
        }
    }

    /// Number of token lookups received.
    pub fn token_lookups(&self) -> usize {
        self.recorded.token_queries.lock().unwrap().len()
    }

    /// Number of Code Climate requests received.
    pub fn code_climate_hits(&self) -> usize {
        *self.recorded.code_climate_hits.lock().unwrap()
    }
}

/// Start the fake upstream on an ephemeral port.
pub async fn spawn_fake_upstream() -> FakeUpstream {
    let recorded = Recorded::default();
    let router = Router::new()
        .route("/settings/v1/tokenstorage/", get(token_storage))
        .route("/cc/v1/repos", get(repos))
        .route("/cc/v1/repos/:id", get(repo))
        .route("/cc/v1/repos/:id/snapshots/:snapshot", get(snapshot))
        .route("/cc/v1/repos/:id/test_reports", get(test_reports))
        .with_state(recorded.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    FakeUpstream { addr, recorded }
}

async fn token_storage(
    State(recorded): State<Recorded>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    recorded.token_queries.lock().unwrap().push(params.clone());

    match params.get("instance_id").map(String::as_str) {
        Some("inst-1") => Json(json!({"github_token": TOKEN})).into_response(),
        Some("no-token") => Json(json!({"detail": "nothing stored"})).into_response(),
        Some("garbled") => "<html>oops</html>".into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn authorized(recorded: &Recorded, headers: &HeaderMap) -> bool {
    *recorded.code_climate_hits.lock().unwrap() += 1;
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Token token={TOKEN}"))
}

async fn repos(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&recorded, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let data = match params.get("github_slug").map(String::as_str) {
        Some("alice/proj") => json!([{"id": "123", "type": "repos"}]),
        Some("alice/bare") => json!([{"id": "456", "type": "repos"}]),
        Some("alice/weird") => json!([{"id": 42, "type": "repos"}]),
        _ => json!([]),
    };
    Json(json!({ "data": data })).into_response()
}

async fn repo(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&recorded, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match id.as_str() {
        "123" => Json(json!({
            "data": {
                "id": "123",
                "type": "repos",
                "attributes": {"github_slug": "alice/proj"},
                "relationships": {
                    "latest_default_branch_snapshot": {"data": {"id": "snap-1", "type": "snapshots"}}
                }
            }
        }))
        .into_response(),
        "456" => Json(json!({
            "data": {
                "id": "456",
                "type": "repos",
                "relationships": {"latest_default_branch_snapshot": {"data": null}}
            }
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn snapshot(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Path((id, snapshot)): Path<(String, String)>,
) -> Response {
    if !authorized(&recorded, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    if id == "123" && snapshot == "snap-1" {
        Json(json!({
            "data": {"id": "snap-1", "type": "snapshots", "attributes": {"gpa": 3.8, "ratings": []}}
        }))
        .into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn test_reports(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&recorded, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let data = match id.as_str() {
        "123" => json!([
            {"id": "r1", "type": "test_reports", "attributes": {"date": "2020-01-01", "pct": 80}},
            {"id": "r2", "type": "test_reports", "attributes": {"date": "2020-02-01", "pct": 82.5}}
        ]),
        _ => json!([]),
    };
    Json(json!({ "data": data })).into_response()
}

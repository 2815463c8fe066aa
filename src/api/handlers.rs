//! HTTP API handlers.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use strum::IntoStaticStr;
use tracing::{info, warn};

use crate::aggregator::{Aggregator, RepoRequest};
use crate::error::ApiError;
use crate::metrics;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lookup orchestration over the collaborators.
    pub aggregator: Aggregator,
    /// Prometheus handle, `None` when metrics are disabled.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            prometheus: None,
        }
    }

    /// Serve metrics from the given Prometheus handle.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("aggregator", &self.aggregator)
            .field("metrics_enabled", &self.prometheus.is_some())
            .finish()
    }
}

/// Endpoint label used in metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Endpoint {
    /// Codebase GPA.
    CodebaseGpa,
    /// Test coverage history.
    CoverageHistory,
    /// Liveness check.
    Health,
}

/// Query parameters accepted by the metric endpoints.
///
/// Parsed leniently from a map so that a missing `instance_id` always
/// reports 401, whatever else the query string contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsQuery {
    /// Tenant/installation id.
    pub instance_id: Option<String>,
    /// Optional user scope for the token lookup.
    pub user_email: Option<String>,
    /// Repository owner.
    pub github_user: Option<String>,
    /// Repository name.
    pub github_repo: Option<String>,
}

impl From<HashMap<String, String>> for MetricsQuery {
    fn from(mut params: HashMap<String, String>) -> Self {
        Self {
            instance_id: params.remove("instance_id"),
            user_email: params.remove("user_email"),
            github_user: params.remove("github_user"),
            github_repo: params.remove("github_repo"),
        }
    }
}

impl MetricsQuery {
    /// `instance_id` must be present and non-empty.
    pub fn require_instance_id(&self) -> Result<String, ApiError> {
        match self.instance_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => {
                warn!("Missing instance ID");
                Err(ApiError::MissingCredential)
            }
        }
    }

    /// Full validation for the GPA endpoint: instance id, then owner, then name.
    pub fn validate_repo(&self) -> Result<RepoRequest, ApiError> {
        let instance_id = self.require_instance_id()?;

        let github_user = match non_blank(&self.github_user) {
            Some(user) => user,
            None => {
                warn!("Missing Github username");
                return Err(ApiError::MissingParameter("github_user"));
            }
        };

        let github_repo = match non_blank(&self.github_repo) {
            Some(repo) => repo,
            None => {
                warn!("Missing github_repo");
                return Err(ApiError::MissingParameter("github_repo"));
            }
        };

        Ok(RepoRequest {
            instance_id,
            user_email: self.user_email.clone(),
            github_user,
            github_repo,
        })
    }

    /// Coverage endpoint only requires the instance id up front.
    pub fn validate_instance(&self) -> Result<RepoRequest, ApiError> {
        Ok(RepoRequest {
            instance_id: self.require_instance_id()?,
            user_email: self.user_email.clone(),
            github_user: self.github_user.clone().unwrap_or_default(),
            github_repo: self.github_repo.clone().unwrap_or_default(),
        })
    }
}

/// Value as given, if it has any non-whitespace content.
fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

fn record(endpoint: Endpoint, response: Response) -> Response {
    metrics::inc_api_requests(endpoint.into(), response.status().as_u16());
    response
}

/// Codebase GPA handler: 200 with the GPA, 404 with sentinel data when the
/// repository is not tracked.
pub async fn codebase_gpa(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    info!("Get codebase GPA");
    let query = MetricsQuery::from(params);

    let response = match query.validate_repo() {
        Ok(request) => match state.aggregator.codebase_gpa(&request).await {
            Ok(report) if report.found => (StatusCode::OK, Json(report.body)).into_response(),
            Ok(report) => (StatusCode::NOT_FOUND, Json(report.body)).into_response(),
            Err(e) => e.into_response(),
        },
        Err(e) => e.into_response(),
    };

    record(Endpoint::CodebaseGpa, response)
}

/// Coverage history handler: always 200 with a (possibly empty) history on success.
pub async fn coverage_history(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    info!("Attempting to retrieve coverage history");
    let query = MetricsQuery::from(params);

    let response = match query.validate_instance() {
        Ok(request) => match state.aggregator.coverage_history(&request).await {
            Ok(body) => (StatusCode::OK, Json(body)).into_response(),
            Err(e) => e.into_response(),
        },
        Err(e) => e.into_response(),
    };

    record(Endpoint::CoverageHistory, response)
}

/// Health check handler - always returns 200 with `hello`.
pub async fn hello() -> Response {
    record(Endpoint::Health, "hello".into_response())
}

/// Prometheus exposition, 404 when metrics are disabled.
pub async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

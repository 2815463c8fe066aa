//! Request orchestration over the two collaborators.
//!
//! Each request resolves a token, then a repository id, then one metric.
//! Nothing is cached between requests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::error::{ApiError, UpstreamError};
use crate::upstream::{
    build_http_client, AccessToken, CodeClimateClient, CodeMetricService, CoverageHistory,
    RepoSlug, SettingsClient, TokenStore,
};

/// GPA reported when the repository cannot be resolved.
pub const GPA_NOT_AVAILABLE: &str = "-1";

/// Validated, request-scoped inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRequest {
    /// Tenant/installation id scoping the token lookup.
    pub instance_id: String,
    /// Optional user scope for the token lookup.
    pub user_email: Option<String>,
    /// Repository owner.
    pub github_user: String,
    /// Repository name.
    pub github_repo: String,
}

impl RepoRequest {
    /// `owner/name` slug of the requested repository.
    pub fn slug(&self) -> RepoSlug {
        RepoSlug::new(&self.github_user, &self.github_repo)
    }
}

/// Body of the GPA endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpaResponse {
    /// Echo of `github_user`.
    pub user: String,
    /// Echo of `github_repo`.
    pub repo_name: String,
    /// Resolved repository id, empty when unresolved.
    pub repo_id: String,
    /// Maintainability GPA, `"-1"` when unresolved.
    pub gpa: String,
}

/// Outcome of a GPA lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpaReport {
    /// Whether the repository resolved to an id.
    pub found: bool,
    /// Body to return.
    pub body: GpaResponse,
}

/// Body of the coverage-history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResponse {
    /// Echo of `github_user`.
    pub user: String,
    /// Echo of `github_repo`.
    pub repo_name: String,
    /// Resolved repository id, empty when unresolved.
    pub repo_id: String,
    /// Coverage data points, unmodified.
    #[serde(rename = "coverage-history")]
    pub coverage_history: CoverageHistory,
}

/// Runs lookups against injected collaborators.
#[derive(Clone)]
pub struct Aggregator {
    tokens: Arc<dyn TokenStore>,
    code_metrics: Arc<dyn CodeMetricService>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator").finish_non_exhaustive()
    }
}

impl Aggregator {
    /// Create an aggregator over the given collaborators.
    pub fn new(tokens: Arc<dyn TokenStore>, code_metrics: Arc<dyn CodeMetricService>) -> Self {
        Self {
            tokens,
            code_metrics,
        }
    }

    /// Wire the real HTTP collaborators from config.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let http = build_http_client(config)?;
        let settings = SettingsClient::new(config, http.clone())?;
        let code_climate = CodeClimateClient::new(config, http)?;
        Ok(Self::new(Arc::new(settings), Arc::new(code_climate)))
    }

    async fn resolve_token(&self, request: &RepoRequest) -> Result<AccessToken, ApiError> {
        self.tokens
            .fetch_token(&request.instance_id, request.user_email.as_deref())
            .await
            .map_err(classify)
    }

    /// Look up the maintainability GPA for the requested repository.
    #[instrument(skip_all, fields(slug = %request.slug()))]
    pub async fn codebase_gpa(&self, request: &RepoRequest) -> Result<GpaReport, ApiError> {
        let token = self.resolve_token(request).await?;
        let repo_id = self
            .code_metrics
            .retrieve_repo_id_using_repo_name(&token, &request.slug())
            .await
            .map_err(classify)?;

        let Some(repo_id) = repo_id else {
            info!("Repository not tracked, reporting sentinel GPA");
            return Ok(GpaReport {
                found: false,
                body: GpaResponse {
                    user: request.github_user.clone(),
                    repo_name: request.github_repo.clone(),
                    repo_id: String::new(),
                    gpa: GPA_NOT_AVAILABLE.to_string(),
                },
            });
        };

        let gpa = self
            .code_metrics
            .get_codebase_gpa(&token, &repo_id)
            .await
            .map_err(classify)?;

        Ok(GpaReport {
            found: true,
            body: GpaResponse {
                user: request.github_user.clone(),
                repo_name: request.github_repo.clone(),
                repo_id,
                gpa,
            },
        })
    }

    /// Look up the test coverage history for the requested repository.
    ///
    /// An unresolved repository yields an empty history.
    #[instrument(skip_all, fields(slug = %request.slug()))]
    pub async fn coverage_history(
        &self,
        request: &RepoRequest,
    ) -> Result<CoverageResponse, ApiError> {
        let token = self.resolve_token(request).await?;
        let repo_id = self
            .code_metrics
            .retrieve_repo_id_using_repo_name(&token, &request.slug())
            .await
            .map_err(classify)?;

        let coverage_history = match &repo_id {
            Some(id) => self
                .code_metrics
                .get_test_coverage_history(&token, id)
                .await
                .map_err(classify)?,
            None => {
                info!("Repository not tracked, reporting empty coverage history");
                Vec::new()
            }
        };

        Ok(CoverageResponse {
            user: request.github_user.clone(),
            repo_name: request.github_repo.clone(),
            repo_id: repo_id.unwrap_or_default(),
            coverage_history,
        })
    }
}

/// Map a collaborator failure to the endpoint taxonomy, logging the detail.
fn classify(err: UpstreamError) -> ApiError {
    match &err {
        UpstreamError::Conversion { .. } => warn!(error = %err, "Repository ID not found"),
        _ => error!(error = %err, "Upstream request failed"),
    }
    err.into()
}

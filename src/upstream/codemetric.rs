//! Code Climate API client: repository lookup, maintainability GPA and coverage history.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::error::UpstreamError;
use crate::metrics::{self, LatencyTimer, SERVICE_CODE_CLIMATE};

use super::types::{
    gpa_from_value, repo_id_from_value, AccessToken, CoverageHistory, Document, RepoId, RepoSlug,
    Resource,
};

/// Media type Code Climate answers with.
const JSON_API: &str = "application/vnd.api+json";

/// Code-quality capabilities the endpoints rely on.
///
/// Every call carries the token resolved for the current request.
#[async_trait]
pub trait CodeMetricService: Send + Sync {
    /// Resolve `owner/name` to a repository id. `None` when the repository is
    /// unknown or not yet tracked.
    async fn retrieve_repo_id_using_repo_name(
        &self,
        token: &AccessToken,
        slug: &RepoSlug,
    ) -> Result<Option<RepoId>, UpstreamError>;

    /// Maintainability GPA of the repository's latest default-branch snapshot.
    async fn get_codebase_gpa(
        &self,
        token: &AccessToken,
        repo_id: &str,
    ) -> Result<String, UpstreamError>;

    /// Test coverage reports, oldest first as returned upstream.
    async fn get_test_coverage_history(
        &self,
        token: &AccessToken,
        repo_id: &str,
    ) -> Result<CoverageHistory, UpstreamError>;
}

/// HTTP client for the Code Climate v1 API.
#[derive(Debug, Clone)]
pub struct CodeClimateClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CodeClimateClient {
    /// Create a client from config, sharing the given HTTP client.
    pub fn new(config: &Config, http: reqwest::Client) -> Result<Self, UpstreamError> {
        Ok(Self {
            http,
            base_url: config.code_climate_base()?,
        })
    }

    /// API base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Endpoint under the base URL. Each segment is percent-encoded, so an
    /// upstream id can never change the path, query or fragment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| UpstreamError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Authenticated GET of a JSON:API document.
    async fn get_document<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Document<T>, UpstreamError> {
        let _timer = LatencyTimer::new(SERVICE_CODE_CLIMATE);
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();

        let response = self
            .http
            .get(url)
            .query(query)
            .header(AUTHORIZATION, format!("Token token={}", token.as_str()))
            .header(ACCEPT, JSON_API)
            .send()
            .await
            .inspect_err(|_| metrics::inc_upstream_failed(SERVICE_CODE_CLIMATE))?;

        if !response.status().is_success() {
            metrics::inc_upstream_failed(SERVICE_CODE_CLIMATE);
            warn!(status = %response.status(), path = %path, "Code Climate request failed");
            return Err(UpstreamError::Status {
                service: SERVICE_CODE_CLIMATE,
                status: response.status().as_u16(),
            });
        }

        // Read the body first so transport and decode failures stay distinct.
        let bytes = response
            .bytes()
            .await
            .inspect_err(|_| metrics::inc_upstream_failed(SERVICE_CODE_CLIMATE))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            metrics::inc_upstream_failed(SERVICE_CODE_CLIMATE);
            UpstreamError::Parse {
                service: SERVICE_CODE_CLIMATE,
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl CodeMetricService for CodeClimateClient {
    #[instrument(skip_all, fields(slug = %slug))]
    async fn retrieve_repo_id_using_repo_name(
        &self,
        token: &AccessToken,
        slug: &RepoSlug,
    ) -> Result<Option<RepoId>, UpstreamError> {
        let slug = slug.to_string();
        let doc: Document<Vec<Resource>> = self
            .get_document(token, &["repos"], &[("github_slug", slug.as_str())])
            .await?;

        let repo_id = match doc.data.first() {
            Some(repo) => repo_id_from_value(&repo.id)?,
            None => None,
        };
        debug!(repo_id = ?repo_id, "Resolved repository");
        Ok(repo_id)
    }

    #[instrument(skip_all, fields(repo_id = %repo_id))]
    async fn get_codebase_gpa(
        &self,
        token: &AccessToken,
        repo_id: &str,
    ) -> Result<String, UpstreamError> {
        let repo: Document<Resource> = self
            .get_document(token, &["repos", repo_id], &[])
            .await?;

        let snapshot_id = repo
            .data
            .relationships
            .latest_default_branch_snapshot
            .and_then(|rel| rel.data)
            .map(|r| r.id)
            .ok_or(UpstreamError::MissingField {
                service: SERVICE_CODE_CLIMATE,
                field: "latest_default_branch_snapshot",
            })?;

        let snapshot: Document<Resource> = self
            .get_document(token, &["repos", repo_id, "snapshots", snapshot_id.as_str()], &[])
            .await?;

        let gpa = gpa_from_value(&snapshot.data.attributes["gpa"])?;
        debug!(snapshot_id = %snapshot_id, gpa = %gpa, "Fetched codebase GPA");
        Ok(gpa)
    }

    #[instrument(skip_all, fields(repo_id = %repo_id))]
    async fn get_test_coverage_history(
        &self,
        token: &AccessToken,
        repo_id: &str,
    ) -> Result<CoverageHistory, UpstreamError> {
        let reports: Document<Vec<Resource>> = self
            .get_document(token, &["repos", repo_id, "test_reports"], &[])
            .await?;

        let history: CoverageHistory = reports
            .data
            .into_iter()
            .map(|report| report.attributes)
            .collect();
        debug!(points = history.len(), "Fetched coverage history");
        Ok(history)
    }
}

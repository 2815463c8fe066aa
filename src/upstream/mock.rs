//! In-memory collaborators for unit testing.
//!
//! These stand in for the settings-management and Code Climate clients
//! without making real network requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::metrics::{SERVICE_CODE_CLIMATE, SERVICE_SETTINGS};

use super::codemetric::CodeMetricService;
use super::settings::TokenStore;
use super::types::{AccessToken, CoverageHistory, RepoId, RepoSlug};

/// Configuration for mock failure behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Answer token lookups with an upstream status error.
    pub fail_token: bool,
    /// Answer repository lookups with an upstream status error.
    pub fail_repo_lookup: bool,
    /// Answer GPA lookups with an upstream status error.
    pub fail_gpa: bool,
    /// Answer coverage lookups with an upstream status error.
    pub fail_coverage: bool,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

async fn simulate_latency(latency_ms: u64) {
    if latency_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(latency_ms)).await;
    }
}

/// Mock token store keyed by instance id.
#[derive(Debug, Clone, Default)]
pub struct MockTokenStore {
    config: MockConfig,
    tokens: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<AtomicUsize>,
}

impl MockTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with custom failure configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Register a token for an instance.
    pub fn set_token(&self, instance_id: impl Into<String>, token: impl Into<String>) {
        self.tokens
            .lock()
            .unwrap()
            .insert(instance_id.into(), token.into());
    }

    /// Number of lookups performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenStore for MockTokenStore {
    async fn fetch_token(
        &self,
        instance_id: &str,
        _user_email: Option<&str>,
    ) -> Result<AccessToken, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        simulate_latency(self.config.latency_ms).await;

        if self.config.fail_token {
            return Err(UpstreamError::Status {
                service: SERVICE_SETTINGS,
                status: 503,
            });
        }

        let tokens = self.tokens.lock().unwrap();
        tokens
            .get(instance_id)
            .map(AccessToken::new)
            .ok_or(UpstreamError::MissingField {
                service: SERVICE_SETTINGS,
                field: "github_token",
            })
    }
}

/// Canned repository data.
#[derive(Debug, Clone, Default)]
pub struct MockRepo {
    /// Repository id to resolve to. `None` simulates an untracked repository.
    pub repo_id: Option<RepoId>,
    /// GPA to return for the repository.
    pub gpa: Option<String>,
    /// Coverage history to return.
    pub coverage: CoverageHistory,
}

/// Mock Code Climate service keyed by `owner/name`.
#[derive(Debug, Clone, Default)]
pub struct MockCodeMetricService {
    config: MockConfig,
    repos: Arc<Mutex<HashMap<String, MockRepo>>>,
    /// Token the mock expects; lookups with any other token fail.
    expected_token: Option<String>,
    conversion_failure: Option<&'static str>,
    calls: Arc<AtomicUsize>,
}

impl MockCodeMetricService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service with custom failure configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Only accept calls authenticated with `token`.
    pub fn expect_token(mut self, token: impl Into<String>) -> Self {
        self.expected_token = Some(token.into());
        self
    }

    /// Fail the named field with a conversion error.
    pub fn fail_conversion(mut self, field: &'static str) -> Self {
        self.conversion_failure = Some(field);
        self
    }

    /// Register canned data for `owner/name`.
    pub fn set_repo(&self, slug: &RepoSlug, repo: MockRepo) {
        self.repos.lock().unwrap().insert(slug.to_string(), repo);
    }

    /// Number of calls performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, token: &AccessToken, fail: bool) -> Result<(), UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        simulate_latency(self.config.latency_ms).await;

        let wrong_token = self
            .expected_token
            .as_deref()
            .is_some_and(|expected| expected != token.as_str());
        if fail || wrong_token {
            return Err(UpstreamError::Status {
                service: SERVICE_CODE_CLIMATE,
                status: if wrong_token { 401 } else { 503 },
            });
        }
        Ok(())
    }

    fn check_conversion(&self, field: &'static str) -> Result<(), UpstreamError> {
        if self.conversion_failure == Some(field) {
            return Err(UpstreamError::Conversion {
                field,
                value: "{}".to_string(),
            });
        }
        Ok(())
    }

    fn find_by_id(&self, repo_id: &str) -> Option<MockRepo> {
        self.repos
            .lock()
            .unwrap()
            .values()
            .find(|repo| repo.repo_id.as_deref() == Some(repo_id))
            .cloned()
    }
}

#[async_trait]
impl CodeMetricService for MockCodeMetricService {
    async fn retrieve_repo_id_using_repo_name(
        &self,
        token: &AccessToken,
        slug: &RepoSlug,
    ) -> Result<Option<RepoId>, UpstreamError> {
        self.enter(token, self.config.fail_repo_lookup).await?;
        self.check_conversion("id")?;

        let repos = self.repos.lock().unwrap();
        Ok(repos
            .get(&slug.to_string())
            .and_then(|repo| repo.repo_id.clone()))
    }

    async fn get_codebase_gpa(
        &self,
        token: &AccessToken,
        repo_id: &str,
    ) -> Result<String, UpstreamError> {
        self.enter(token, self.config.fail_gpa).await?;
        self.check_conversion("gpa")?;

        self.find_by_id(repo_id)
            .and_then(|repo| repo.gpa)
            .ok_or(UpstreamError::MissingField {
                service: SERVICE_CODE_CLIMATE,
                field: "latest_default_branch_snapshot",
            })
    }

    async fn get_test_coverage_history(
        &self,
        token: &AccessToken,
        repo_id: &str,
    ) -> Result<CoverageHistory, UpstreamError> {
        self.enter(token, self.config.fail_coverage).await?;

        Ok(self
            .find_by_id(repo_id)
            .map(|repo| repo.coverage)
            .unwrap_or_default())
    }
}

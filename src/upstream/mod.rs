//! Outbound collaborators.
//!
//! This module handles:
//! - Token lookup against the settings-management service
//! - Repository, GPA and coverage lookups against Code Climate
//! - Mock collaborators for testing

pub mod codemetric;
pub mod mock;
pub mod settings;
pub mod types;

use std::time::Duration;

use crate::config::Config;

pub use codemetric::{CodeClimateClient, CodeMetricService};
pub use mock::{MockCodeMetricService, MockConfig, MockRepo, MockTokenStore};
pub use settings::{SettingsClient, TokenStore};
pub use types::{AccessToken, CoverageHistory, RepoId, RepoSlug};

/// Build the HTTP client shared by both collaborators.
///
/// No request timeout is set unless `HTTP_TIMEOUT_MS` is configured.
pub fn build_http_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        // Keep connections alive for reuse
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90));

    if let Some(ms) = config.http_timeout_ms {
        builder = builder.timeout(Duration::from_millis(ms));
    }

    builder.build()
}

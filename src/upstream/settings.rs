//! Settings-management client: resolves the stored access token for an instance.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::error::UpstreamError;
use crate::metrics::{self, LatencyTimer, SERVICE_SETTINGS};

use super::types::AccessToken;

/// Path of the token-storage endpoint relative to the base URL.
const TOKEN_STORAGE_PATH: &str = "v1/tokenstorage/";

/// Field holding the token in the token-storage response.
const TOKEN_FIELD: &str = "github_token";

/// Looks up the access token stored for an instance/user.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fetch the token for `instance_id`, optionally scoped to `user_email`.
    async fn fetch_token(
        &self,
        instance_id: &str,
        user_email: Option<&str>,
    ) -> Result<AccessToken, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct TokenQuery<'a> {
    instance_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_email: Option<&'a str>,
}

/// HTTP client for the settings-management service.
#[derive(Debug, Clone)]
pub struct SettingsClient {
    http: reqwest::Client,
    token_url: Url,
}

impl SettingsClient {
    /// Create a client from config, sharing the given HTTP client.
    pub fn new(config: &Config, http: reqwest::Client) -> Result<Self, UpstreamError> {
        let token_url = config.setting_manage_base()?.join(TOKEN_STORAGE_PATH)?;
        Ok(Self { http, token_url })
    }

    /// Full token-storage URL.
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }
}

#[async_trait]
impl TokenStore for SettingsClient {
    #[instrument(skip_all, fields(instance_id = %instance_id))]
    async fn fetch_token(
        &self,
        instance_id: &str,
        user_email: Option<&str>,
    ) -> Result<AccessToken, UpstreamError> {
        let _timer = LatencyTimer::new(SERVICE_SETTINGS);

        let response = self
            .http
            .get(self.token_url.clone())
            .query(&TokenQuery {
                instance_id,
                user_email,
            })
            .send()
            .await
            .inspect_err(|_| metrics::inc_upstream_failed(SERVICE_SETTINGS))?;

        if !response.status().is_success() {
            metrics::inc_upstream_failed(SERVICE_SETTINGS);
            warn!(status = %response.status(), "Token lookup failed");
            return Err(UpstreamError::Status {
                service: SERVICE_SETTINGS,
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            metrics::inc_upstream_failed(SERVICE_SETTINGS);
            UpstreamError::Parse {
                service: SERVICE_SETTINGS,
                reason: e.to_string(),
            }
        })?;

        let token = extract_token(&body)?;
        debug!("Resolved access token");
        Ok(token)
    }
}

/// Pull the token out of a token-storage response body.
fn extract_token(body: &Value) -> Result<AccessToken, UpstreamError> {
    body.get(TOKEN_FIELD)
        .and_then(Value::as_str)
        .map(AccessToken::new)
        .ok_or(UpstreamError::MissingField {
            service: SERVICE_SETTINGS,
            field: TOKEN_FIELD,
        })
}

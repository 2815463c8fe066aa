//! Application configuration loaded from environment variables.

use serde::{de, Deserialize, Deserializer};
use strum::Display;
use url::Url;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Upstream Services ===
    /// Settings-management service base URL (token storage).
    #[serde(default = "default_setting_manage_url")]
    pub setting_manage_url: String,

    /// Code Climate API base URL.
    #[serde(default = "default_code_climate_url")]
    pub code_climate_url: String,

    /// Optional outbound request timeout. Unset means no timeout.
    #[serde(default)]
    pub http_timeout_ms: Option<u64>,

    // === Deployment ===
    /// Secret key carried for deployment parity.
    #[serde(default = "default_secret_key")]
    pub secret_key: String,

    /// Production deployment flag.
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub prod: bool,

    /// Debug flag.
    #[serde(default, deserialize_with = "flag")]
    pub debug: bool,

    /// Environment name.
    #[serde(default = "default_env")]
    pub env: String,

    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_true", deserialize_with = "flag")]
    pub metrics_enabled: bool,
}

/// Deployment mode derived from the `PROD` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeploymentMode {
    /// `PROD=true`.
    Production,
    /// `PROD=false`.
    Development,
}

pub(crate) const DEFAULT_SECRET_KEY: &str = "insecure-development-secret-key";

fn default_setting_manage_url() -> String {
    "https://discovery-settingmanagement.azurewebsites.net/".to_string()
}

fn default_code_climate_url() -> String {
    "https://api.codeclimate.com/v1/".to_string()
}

fn default_secret_key() -> String {
    DEFAULT_SECRET_KEY.to_string()
}

fn default_true() -> bool {
    true
}

fn default_env() -> String {
    "development".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            setting_manage_url: default_setting_manage_url(),
            code_climate_url: default_code_climate_url(),
            http_timeout_ms: None,
            secret_key: default_secret_key(),
            prod: true,
            debug: false,
            env: default_env(),
            port: default_port(),
            rust_log: default_log_level(),
            metrics_enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        check_base_url("SETTING_MANAGE_URL", &self.setting_manage_url)?;
        check_base_url("CODE_CLIMATE_URL", &self.code_climate_url)?;

        if self.port == 0 {
            return Err("PORT must be non-zero".to_string());
        }

        if self.http_timeout_ms == Some(0) {
            return Err("HTTP_TIMEOUT_MS must be greater than 0 when set".to_string());
        }

        Ok(())
    }

    /// Deployment mode. Only affects wiring, never request handling.
    pub fn deployment_mode(&self) -> DeploymentMode {
        if self.prod {
            DeploymentMode::Production
        } else {
            DeploymentMode::Development
        }
    }

    /// Check if running in the development environment.
    pub fn is_dev(&self) -> bool {
        self.env == "development"
    }

    /// Whether the secret key is still the built-in placeholder.
    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }

    /// Placeholder secret outside the development environment.
    pub fn insecure_secret(&self) -> bool {
        self.uses_default_secret() && !self.is_dev()
    }

    /// Settings-management base URL, normalised to end with `/`.
    pub fn setting_manage_base(&self) -> Result<Url, url::ParseError> {
        base_url(&self.setting_manage_url)
    }

    /// Code Climate base URL, normalised to end with `/`.
    pub fn code_climate_base(&self) -> Result<Url, url::ParseError> {
        base_url(&self.code_climate_url)
    }
}

/// Parse a base URL so that relative joins keep its path prefix.
pub fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}

/// Accepts `true`/`True`/`1`/`yes` style flags as deployments set them.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(de::Error::custom(format!("invalid boolean flag: {other}"))),
    }
}

fn check_base_url(name: &str, raw: &str) -> Result<(), String> {
    let url = base_url(raw).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{name} must use http or https, got {other}")),
    }
}

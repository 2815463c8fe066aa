//! Unified error types for the metrics service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Process-level error for startup and CLI commands.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Upstream collaborator error.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// HTTP client construction error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the settings-management or Code Climate services.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Transport-level failure.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code.
    #[error("{service} responded with HTTP {status}")]
    Status {
        /// Which collaborator answered.
        service: &'static str,
        /// Status code received.
        status: u16,
    },

    /// Body was not the JSON we expected.
    #[error("failed to parse {service} response: {reason}")]
    Parse {
        /// Which collaborator answered.
        service: &'static str,
        /// Parser message.
        reason: String,
    },

    /// A required field was absent.
    #[error("{service} response is missing {field}")]
    MissingField {
        /// Which collaborator answered.
        service: &'static str,
        /// Field name.
        field: &'static str,
    },

    /// A value was present but could not be coerced.
    #[error("cannot convert {field} from {value}")]
    Conversion {
        /// Field name.
        field: &'static str,
        /// Offending value, rendered as JSON.
        value: String,
    },

    /// Endpoint URL could not be built.
    #[error("invalid upstream url: {0}")]
    Url(#[from] url::ParseError),
}

/// Error returned by the HTTP endpoints. Each variant maps to one status code.
#[derive(Error, Debug)]
pub enum ApiError {
    /// `instance_id` missing or empty.
    #[error("missing instance id")]
    MissingCredential,

    /// A required query parameter is missing or blank.
    #[error("need to specify {0}")]
    MissingParameter(&'static str),

    /// A value could not be converted while resolving the repository.
    #[error("repository id not found: {0}")]
    RepoIdNotFound(String),

    /// Any other collaborator failure.
    #[error("upstream failure: {0}")]
    Upstream(UpstreamError),
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Conversion { field, value } => {
                ApiError::RepoIdNotFound(format!("{field}={value}"))
            }
            other => ApiError::Upstream(other),
        }
    }
}

impl ApiError {
    /// Status code this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCredential => StatusCode::UNAUTHORIZED,
            ApiError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::RepoIdNotFound(_) | ApiError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON error body. Never carries internal error detail.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Client-safe message.
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::MissingCredential => return status.into_response(),
            ApiError::MissingParameter(name) => format!("Need to specify {name}"),
            ApiError::RepoIdNotFound(_) => "repository id not found".to_string(),
            ApiError::Upstream(_) => "internal server error".to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ServiceError>;

//! Request-scoped values and upstream wire types.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::UpstreamError;

/// Opaque repository identifier assigned by Code Climate.
pub type RepoId = String;

/// Coverage data points, passed through exactly as Code Climate returns them.
pub type CoverageHistory = Vec<Value>;

/// Access token resolved from the settings-management service.
///
/// Lives for one request. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token for the Authorization header.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// A GitHub `owner/name` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    /// Repository owner (`github_user`).
    pub owner: String,
    /// Repository name (`github_repo`).
    pub name: String,
}

impl RepoSlug {
    /// Create a slug from its two halves.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// === Code Climate JSON:API documents ===

/// Top-level JSON:API document.
#[derive(Debug, Clone, Deserialize)]
pub struct Document<T> {
    /// Primary data.
    pub data: T,
}

/// A single JSON:API resource object.
#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    /// Resource id. Kept raw so odd shapes surface as conversion failures.
    #[serde(default)]
    pub id: Value,
    /// Attribute object.
    #[serde(default)]
    pub attributes: Value,
    /// Relationship links.
    #[serde(default)]
    pub relationships: Relationships,
}

/// Relationships of a repository resource we care about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Relationships {
    /// Most recent snapshot on the default branch.
    #[serde(default)]
    pub latest_default_branch_snapshot: Option<Relationship>,
}

/// A to-one relationship.
#[derive(Debug, Clone, Deserialize)]
pub struct Relationship {
    /// Linked resource, absent when nothing is linked yet.
    #[serde(default)]
    pub data: Option<ResourceRef>,
}

/// Reference to another resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRef {
    /// Linked resource id.
    pub id: String,
}

/// Interpret a repository `id` value. Null or empty means "not tracked".
pub fn repo_id_from_value(value: &Value) -> Result<Option<RepoId>, UpstreamError> {
    match value {
        Value::Null => Ok(None),
        Value::String(id) if id.is_empty() => Ok(None),
        Value::String(id) => Ok(Some(id.clone())),
        other => Err(UpstreamError::Conversion {
            field: "id",
            value: other.to_string(),
        }),
    }
}

/// Render a GPA value as the string the endpoints return.
pub fn gpa_from_value(value: &Value) -> Result<String, UpstreamError> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        other => Err(UpstreamError::Conversion {
            field: "gpa",
            value: other.to_string(),
        }),
    }
}

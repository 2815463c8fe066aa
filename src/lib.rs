//! Code-quality metrics aggregation service.
//!
//! Resolves a per-instance access token from the settings-management
//! service, then asks Code Climate for a repository's maintainability GPA
//! or test coverage history and reshapes the answer for the caller.
//!
//! ```text
//! GET /codescore/gpa/?instance_id=..&github_user=alice&github_repo=proj
//!   -> settings-management  v1/tokenstorage/      (github_token)
//!   -> Code Climate         repos?github_slug=..  (repo id)
//!   -> Code Climate         repos/<id>/...        (gpa)
//! <- {"user":"alice","repo_name":"proj","repo_id":"123","gpa":"3.8"}
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`upstream`]: Settings-management and Code Climate clients
//! - [`aggregator`]: Per-request lookup orchestration
//! - [`api`]: HTTP endpoints
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod upstream;
pub mod utils;

pub use config::Config;
pub use error::{ApiError, Result, ServiceError};

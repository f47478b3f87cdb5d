//! Error types shared across the crate.
//!
//! Only [`ConfigurationError`] crosses the public boundary of the mapping
//! core. Store and transport faults are absorbed by their callers and show up
//! as missing data plus log output.

use std::path::PathBuf;
use thiserror::Error;

/// Metadata problems that must be fixed by whoever owns the declarations.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("metadata document '{document}' not found (searched: {})", format_searched(.searched))]
    NotFound {
        document: String,
        searched: Vec<String>,
    },

    #[error("invalid service id '{0}'")]
    InvalidServiceId(String),

    #[error("service id mismatch: requested '{expected}', declaration says '{found}'")]
    ServiceMismatch { expected: String, found: String },

    #[error("service '{service}' is missing required setting '{setting}'")]
    MissingSetting { service: String, setting: String },

    #[error("failed to parse metadata document '{document}': {source}")]
    Parse {
        document: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("more than one form is flagged as root: {}", .forms.join(", "))]
    MultipleRoots { forms: Vec<String> },

    #[error("invalid section '{section}': {reason}")]
    InvalidSection { section: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

fn format_searched(searched: &[String]) -> String {
    if searched.is_empty() {
        "nothing".to_string()
    } else {
        searched.join(", ")
    }
}

/// Faults raised by a [`crate::store::RowAccessor`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row store unavailable: {0}")]
    Unavailable(String),

    #[error("query against '{table}' failed: {message}")]
    Query { table: String, message: String },

    #[error("invalid store fixture: {0}")]
    Fixture(String),
}

/// Faults raised while posting a document to a remote endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no submission endpoint configured")]
    MissingEndpoint,

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("document is not valid JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

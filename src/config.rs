//! Application configuration from `recordmap.yaml`, `.env` and the
//! environment.
//!
//! Precedence, lowest first: built-in defaults, the YAML file, environment
//! variables. Command-line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigurationError;
use crate::metadata::{
    DirectorySource, MergePrecedence, MetadataLoader, DEFAULT_METADATA_DIR, DEFAULT_RESOURCES_DIR,
};

pub const DEFAULT_CONFIG_FILE: &str = "recordmap.yaml";

pub const ENV_METADATA_DIR: &str = "RECORDMAP_METADATA_DIR";
pub const ENV_API_ENDPOINT: &str = "RECORDMAP_API_ENDPOINT";
pub const ENV_API_ID: &str = "RECORDMAP_API_ID";
pub const ENV_API_KEY: &str = "RECORDMAP_API_KEY";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub metadata: MetadataSettings,
    #[serde(default)]
    pub submission: SubmissionSettings,
}

/// Where metadata documents live and how they merge
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataSettings {
    #[serde(default = "default_metadata_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_resources_dir")]
    pub resources_dir: PathBuf,
    #[serde(default)]
    pub merge_precedence: MergePrecedence,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            dir: default_metadata_dir(),
            resources_dir: default_resources_dir(),
            merge_precedence: MergePrecedence::default(),
        }
    }
}

/// Remote endpoint settings for document submission
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SubmissionSettings {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Send documents inside the `{"testData": [...]}` wrapper
    #[serde(default)]
    pub wrap_test_data: bool,
    /// Log the full request body at debug level
    #[serde(default)]
    pub log_payload: bool,
    #[serde(default = "default_true")]
    pub validate_before_sending: bool,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_id: None,
            api_key: None,
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            wrap_test_data: false,
            log_payload: false,
            validate_before_sending: default_true(),
        }
    }
}

fn default_metadata_dir() -> PathBuf {
    PathBuf::from(DEFAULT_METADATA_DIR)
}

fn default_resources_dir() -> PathBuf {
    PathBuf::from(DEFAULT_RESOURCES_DIR)
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents, &path.display().to_string())
    }

    pub fn from_yaml(contents: &str, document: &str) -> Result<Self, ConfigurationError> {
        serde_yaml::from_str(contents).map_err(|source| ConfigurationError::Parse {
            document: document.to_string(),
            source,
        })
    }

    /// Load `path` if given, else `recordmap.yaml` when it exists, else the
    /// defaults; then apply `.env` and environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => {
                debug!("No configuration file, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup; blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get(ENV_METADATA_DIR) {
            self.metadata.dir = PathBuf::from(dir);
        }
        if let Some(endpoint) = get(ENV_API_ENDPOINT) {
            self.submission.endpoint = Some(endpoint);
        }
        if let Some(api_id) = get(ENV_API_ID) {
            self.submission.api_id = Some(api_id);
        }
        if let Some(api_key) = get(ENV_API_KEY) {
            self.submission.api_key = Some(api_key);
        }
    }

    /// A loader searching the configured directories in order.
    pub fn metadata_loader(&self) -> MetadataLoader {
        MetadataLoader::new()
            .with_source(DirectorySource::new(&self.metadata.dir))
            .with_source(DirectorySource::new(&self.metadata.resources_dir))
            .with_precedence(self.metadata.merge_precedence)
    }
}

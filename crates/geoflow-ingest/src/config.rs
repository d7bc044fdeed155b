//! Ingestion configuration

use crate::layout::Layout;
use geoflow_common::{DatasetId, PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

// ============================================================================
// Configuration Constants
// ============================================================================

/// GEO series download endpoint; `acc` and `format` are appended as query
/// parameters.
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://www.ncbi.nlm.nih.gov/geo/download/";

/// Default HTTP timeout in seconds. Series archives run to several GB.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

pub const DEFAULT_USER_AGENT: &str = concat!("geoflow/", env!("CARGO_PKG_VERSION"));

/// What happens to a consumed artifact (downloaded archive, `.gz` member)
/// when the step consuming it fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Delete the source once consumption was attempted, whatever the outcome.
    /// Partial outputs stay on disk.
    #[default]
    Always,
    /// Delete the source only after it was consumed successfully. Partial
    /// decompression output is removed and downloads are staged in a `.part`
    /// file until complete.
    OnSuccess,
}

impl CleanupPolicy {
    /// Whether the consumed source should be removed given the outcome
    pub fn removes_source(self, succeeded: bool) -> bool {
        match self {
            CleanupPolicy::Always => true,
            CleanupPolicy::OnSuccess => succeeded,
        }
    }
}

impl std::str::FromStr for CleanupPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(CleanupPolicy::Always),
            "on-success" | "on_success" | "onsuccess" => Ok(CleanupPolicy::OnSuccess),
            _ => Err(PipelineError::Config(format!("Invalid cleanup policy: {}", s))),
        }
    }
}

impl std::fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanupPolicy::Always => write!(f, "always"),
            CleanupPolicy::OnSuccess => write!(f, "on-success"),
        }
    }
}

/// Configuration shared by every stage of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory under which `data/`, `extracted/` and `processed/` live
    pub work_dir: PathBuf,

    pub download_base_url: String,

    pub timeout_secs: u64,

    pub user_agent: String,

    pub cleanup: CleanupPolicy,

    /// Draw a progress bar while downloading
    pub show_progress: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cleanup: CleanupPolicy::Always,
            show_progress: true,
        }
    }
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Load configuration from the environment (and `.env`, if present)
    ///
    /// Environment variables:
    /// - `GEOFLOW_WORK_DIR`
    /// - `GEOFLOW_DOWNLOAD_URL`
    /// - `GEOFLOW_TIMEOUT_SECS`
    /// - `GEOFLOW_USER_AGENT`
    /// - `GEOFLOW_CLEANUP` (`always` or `on-success`)
    /// - `GEOFLOW_PROGRESS` (true/false)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("GEOFLOW_WORK_DIR") {
            config.work_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("GEOFLOW_DOWNLOAD_URL") {
            config.download_base_url = url;
        }
        if let Some(secs) = lookup("GEOFLOW_TIMEOUT_SECS") {
            config.timeout_secs = secs.parse().map_err(|_| {
                PipelineError::Config(format!("GEOFLOW_TIMEOUT_SECS is not a number: {}", secs))
            })?;
        }
        if let Some(agent) = lookup("GEOFLOW_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(policy) = lookup("GEOFLOW_CLEANUP") {
            config.cleanup = policy.parse()?;
        }
        if let Some(progress) = lookup("GEOFLOW_PROGRESS") {
            config.show_progress = progress.parse().unwrap_or(true);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(PipelineError::Config("timeout_secs must be greater than 0".to_string()));
        }
        if self.user_agent.is_empty() {
            return Err(PipelineError::Config("user_agent must not be empty".to_string()));
        }
        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PipelineError::Config(format!(
                "download URL must be http or https, got {}",
                url.scheme()
            )));
        }
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.work_dir)
    }

    /// Retrieval URL for one dataset, e.g.
    /// `https://www.ncbi.nlm.nih.gov/geo/download/?acc=GSE68849&format=file`
    pub fn download_url(&self, dataset: &DatasetId) -> Result<Url> {
        let mut url = self.base_url()?;
        url.query_pairs_mut()
            .append_pair("acc", dataset.as_str())
            .append_pair("format", "file");
        Ok(url)
    }

    fn base_url(&self) -> Result<Url> {
        Url::parse(&self.download_base_url).map_err(|e| {
            PipelineError::Config(format!("Invalid download URL '{}': {}", self.download_base_url, e))
        })
    }
}

#[derive(Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn download_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.download_base_url = url.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn cleanup(mut self, policy: CleanupPolicy) -> Self {
        self.config.cleanup = policy;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    pub fn build(self) -> Result<IngestConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_download_url_for_dataset() {
        let config = IngestConfig::default();
        let id = DatasetId::new("GSE68849").unwrap();
        assert_eq!(
            config.download_url(&id).unwrap().as_str(),
            "https://www.ncbi.nlm.nih.gov/geo/download/?acc=GSE68849&format=file"
        );
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("GEOFLOW_WORK_DIR", "/srv/geo"),
            ("GEOFLOW_TIMEOUT_SECS", "30"),
            ("GEOFLOW_CLEANUP", "on-success"),
            ("GEOFLOW_PROGRESS", "false"),
        ]
        .into_iter()
        .collect();

        let config = IngestConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/srv/geo"));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.cleanup, CleanupPolicy::OnSuccess);
        assert!(!config.show_progress);
        assert_eq!(config.download_base_url, DEFAULT_DOWNLOAD_BASE_URL);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(IngestConfig::from_lookup(|k| {
            (k == "GEOFLOW_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .is_err());
        assert!(IngestConfig::from_lookup(|k| {
            (k == "GEOFLOW_CLEANUP").then(|| "sometimes".to_string())
        })
        .is_err());
        assert!(IngestConfig::builder().download_base_url("ftp://example.org/").build().is_err());
        assert!(IngestConfig::builder().timeout_secs(0).build().is_err());
    }

    #[test]
    fn test_cleanup_policy() {
        assert!(CleanupPolicy::Always.removes_source(false));
        assert!(CleanupPolicy::OnSuccess.removes_source(true));
        assert!(!CleanupPolicy::OnSuccess.removes_source(false));
    }
}

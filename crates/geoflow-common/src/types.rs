//! Common types used across geoflow

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Dataset used when none is given on the command line
pub const DEFAULT_DATASET_ID: &str = "GSE68849";

/// Opaque key naming a remote archive and every artifact derived from it
///
/// The value is passed through verbatim into URLs and file names, so it must be
/// non-empty and a single path component: no `/` or `\`, and not `.` or `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(PipelineError::InvalidDatasetId(
                "dataset identifier must not be empty".to_string(),
            ));
        }
        if raw.contains(['/', '\\']) || raw == "." || raw == ".." {
            return Err(PipelineError::InvalidDatasetId(format!(
                "'{}' is not a single path component",
                raw
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DatasetId {
    fn default() -> Self {
        Self(DEFAULT_DATASET_ID.to_string())
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DatasetId {
    type Err = PipelineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DatasetId {
    type Error = PipelineError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DatasetId> for String {
    fn from(id: DatasetId) -> Self {
        id.0
    }
}

impl AsRef<str> for DatasetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

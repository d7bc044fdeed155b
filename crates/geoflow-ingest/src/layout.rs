//! On-disk layout
//!
//! ```text
//! <work_dir>/data/<id>_RAW.tar
//! <work_dir>/extracted/<id>/<member_stem>/...
//! <work_dir>/processed/<id>/<member_stem>/<file>_<tag>.tsv
//! ```
//!
//! Every path is a pure function of the work directory and the dataset id.

use geoflow_common::DatasetId;
use std::path::{Path, PathBuf};

pub const DATA_DIR: &str = "data";
pub const EXTRACTED_DIR: &str = "extracted";
pub const PROCESSED_DIR: &str = "processed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self, dataset: &DatasetId) -> PathBuf {
        self.root.join(DATA_DIR).join(format!("{}_RAW.tar", dataset))
    }

    pub fn extract_dir(&self, dataset: &DatasetId) -> PathBuf {
        self.root.join(EXTRACTED_DIR).join(dataset.as_str())
    }

    pub fn processed_dir(&self, dataset: &DatasetId) -> PathBuf {
        self.root.join(PROCESSED_DIR).join(dataset.as_str())
    }
}

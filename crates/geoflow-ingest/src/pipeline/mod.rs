//! Stage abstraction and the engine that sequences stages
//!
//! A stage's completion is the existence of its output path. Paths depend only
//! on the stage, the configured work directory and the dataset id, so a run can
//! be interrupted and restarted at any point and will pick up after the last
//! stage whose output exists.

pub mod engine;

pub use engine::{PlannedAction, PlannedStage, Pipeline, RunReport, StageOutcome, StageStatus};

use crate::config::IngestConfig;
use crate::layout::Layout;
use async_trait::async_trait;
use geoflow_common::{DatasetId, PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The fixed set of stages, in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Acquire,
    Unpack,
    Segment,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::Acquire, StageKind::Unpack, StageKind::Segment];

    /// The stage whose output this one consumes
    pub fn dependency(self) -> Option<StageKind> {
        match self {
            StageKind::Acquire => None,
            StageKind::Unpack => Some(StageKind::Acquire),
            StageKind::Segment => Some(StageKind::Unpack),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Acquire => "acquire",
            StageKind::Unpack => "unpack",
            StageKind::Segment => "segment",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for StageKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "acquire" | "download" => Ok(StageKind::Acquire),
            "unpack" | "extract" => Ok(StageKind::Unpack),
            "segment" => Ok(StageKind::Segment),
            _ => Err(PipelineError::Config(format!("Unknown stage: {}", s))),
        }
    }
}

/// Everything a stage may read: the dataset being processed and the run's
/// configuration
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub dataset: DatasetId,
    pub config: IngestConfig,
}

impl PipelineContext {
    pub fn new(dataset: DatasetId, config: IngestConfig) -> Self {
        Self { dataset, config }
    }

    pub fn layout(&self) -> Layout {
        self.config.layout()
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Where this stage's artifact lives. Must not depend on run-time state.
    fn output_path(&self, ctx: &PipelineContext) -> PathBuf;

    fn dependency(&self) -> Option<StageKind> {
        self.kind().dependency()
    }

    fn is_satisfied(&self, ctx: &PipelineContext) -> bool {
        self.output_path(ctx).exists()
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_chain_ends_at_acquire() {
        let mut chain = vec![StageKind::Segment];
        while let Some(dep) = chain.last().and_then(|k| k.dependency()) {
            chain.push(dep);
        }
        assert_eq!(chain, vec![StageKind::Segment, StageKind::Unpack, StageKind::Acquire]);
    }

    #[test]
    fn test_stage_kind_parse() {
        assert_eq!("extract".parse::<StageKind>().ok(), Some(StageKind::Unpack));
        assert_eq!("SEGMENT".parse::<StageKind>().ok(), Some(StageKind::Segment));
        assert!("publish".parse::<StageKind>().is_err());
    }
}

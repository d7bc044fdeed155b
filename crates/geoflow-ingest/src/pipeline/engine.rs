//! Dependency-ordered, existence-checked stage execution

use super::{PipelineContext, Stage, StageKind};
use crate::acquire::AcquireStage;
use crate::segment::SegmentStage;
use crate::transport::Transport;
use crate::unpack::UnpackStage;
use geoflow_common::{DatasetId, PipelineError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn, Instrument};

/// What the engine intends to do with one stage of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    /// Output already exists; the stage and everything upstream of it is left alone
    Skip,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedStage {
    pub kind: StageKind,
    pub action: PlannedAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Skipped,
    Completed { elapsed: Duration },
}

/// Per-stage view used by `geoflow status`
#[derive(Debug, Clone, Serialize)]
pub struct StageStatus {
    pub stage: StageKind,
    pub output: PathBuf,
    pub satisfied: bool,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub dataset: DatasetId,
    pub outcomes: Vec<(StageKind, StageOutcome)>,
}

impl RunReport {
    pub fn executed(&self) -> Vec<StageKind> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, StageOutcome::Completed { .. }))
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn skipped(&self) -> Vec<StageKind> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, StageOutcome::Skipped))
            .map(|(k, _)| *k)
            .collect()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.dataset)?;
        for (kind, outcome) in &self.outcomes {
            match outcome {
                StageOutcome::Skipped => write!(f, " {}=skipped", kind)?,
                StageOutcome::Completed { elapsed } => {
                    write!(f, " {}={:.1}s", kind, elapsed.as_secs_f64())?
                },
            }
        }
        Ok(())
    }
}

/// Runs a terminal stage after whatever unsatisfied stages it depends on
pub struct Pipeline {
    ctx: PipelineContext,
    stages: BTreeMap<StageKind, Box<dyn Stage>>,
}

impl Pipeline {
    /// The standard acquire → unpack → segment chain
    pub fn new(ctx: PipelineContext, transport: Arc<dyn Transport>) -> Self {
        Self::with_stages(
            ctx,
            vec![
                Box::new(AcquireStage::new(transport)),
                Box::new(UnpackStage::new()),
                Box::new(SegmentStage::new()),
            ],
        )
    }

    /// Build from arbitrary stage implementations; a later stage of the same
    /// kind replaces an earlier one
    pub fn with_stages(ctx: PipelineContext, stages: Vec<Box<dyn Stage>>) -> Self {
        let stages = stages.into_iter().map(|s| (s.kind(), s)).collect();
        Self { ctx, stages }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    fn stage(&self, kind: StageKind) -> Result<&dyn Stage> {
        self.stages
            .get(&kind)
            .map(|s| s.as_ref())
            .ok_or_else(|| PipelineError::Config(format!("No stage registered for '{}'", kind)))
    }

    /// Resolve the chain ending at `terminal`, earliest stage first
    ///
    /// Walks backward from the terminal and stops at the first stage whose
    /// output exists (or at a stage with no dependency). Stages upstream of a
    /// satisfied stage are not part of the plan.
    pub fn plan(&self, terminal: StageKind) -> Result<Vec<PlannedStage>> {
        let mut chain: Vec<PlannedStage> = Vec::new();
        let mut next = Some(terminal);

        while let Some(kind) = next {
            if chain.iter().any(|p| p.kind == kind) {
                return Err(PipelineError::Config(format!(
                    "Dependency cycle through stage '{}'",
                    kind
                )));
            }

            let stage = self.stage(kind)?;
            if stage.is_satisfied(&self.ctx) {
                chain.push(PlannedStage {
                    kind,
                    action: PlannedAction::Skip,
                });
                break;
            }

            chain.push(PlannedStage {
                kind,
                action: PlannedAction::Run,
            });
            next = stage.dependency();
        }

        chain.reverse();
        Ok(chain)
    }

    pub fn status(&self) -> Result<Vec<StageStatus>> {
        StageKind::ALL
            .iter()
            .map(|&kind| {
                let stage = self.stage(kind)?;
                Ok(StageStatus {
                    stage: kind,
                    output: stage.output_path(&self.ctx),
                    satisfied: stage.is_satisfied(&self.ctx),
                })
            })
            .collect()
    }

    /// Execute the plan for `terminal` strictly in order
    ///
    /// The first failing stage aborts the run; nothing downstream of it runs
    /// and nothing it already wrote is rolled back.
    pub async fn run(&self, terminal: StageKind) -> Result<RunReport> {
        let dataset = self.ctx.dataset.clone();
        let plan = self.plan(terminal)?;
        let mut report = RunReport {
            dataset: dataset.clone(),
            outcomes: Vec::with_capacity(plan.len()),
        };

        for planned in plan {
            let kind = planned.kind;
            match planned.action {
                PlannedAction::Skip => {
                    info!(stage = %kind, dataset = %dataset, "Output present, skipping stage");
                    report.outcomes.push((kind, StageOutcome::Skipped));
                },
                PlannedAction::Run => {
                    let started = Instant::now();
                    let span = info_span!("stage", stage = %kind, dataset = %dataset);

                    if let Err(e) = self.execute(kind).instrument(span).await {
                        error!(stage = %kind, dataset = %dataset, error = %e, "Stage failed, aborting run");
                        return Err(PipelineError::Stage {
                            stage: kind.to_string(),
                            dataset: dataset.to_string(),
                            source: Box::new(e),
                        });
                    }

                    report.outcomes.push((
                        kind,
                        StageOutcome::Completed {
                            elapsed: started.elapsed(),
                        },
                    ));
                },
            }
        }

        info!(summary = %report, "Pipeline run finished");
        Ok(report)
    }

    async fn execute(&self, kind: StageKind) -> Result<()> {
        let stage = self.stage(kind)?;
        let output = stage.output_path(&self.ctx);

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(output = %output.display(), "Running stage");
        stage.run(&self.ctx).await?;

        if !stage.is_satisfied(&self.ctx) {
            warn!(output = %output.display(), "Stage finished without producing its output");
        }
        Ok(())
    }
}

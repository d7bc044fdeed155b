//! Acquire stage: fetch the raw series archive

use crate::config::CleanupPolicy;
use crate::pipeline::{PipelineContext, Stage, StageKind};
use crate::transport::Transport;
use crate::unpack::discard_file;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

pub struct AcquireStage {
    transport: Arc<dyn Transport>,
}

impl AcquireStage {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Stage for AcquireStage {
    fn kind(&self) -> StageKind {
        StageKind::Acquire
    }

    fn output_path(&self, ctx: &PipelineContext) -> PathBuf {
        ctx.layout().archive_path(&ctx.dataset)
    }

    async fn run(&self, ctx: &PipelineContext) -> geoflow_common::Result<()> {
        let dest = self.output_path(ctx);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = ctx.config.download_url(&ctx.dataset)?;
        info!(dataset = %ctx.dataset, url = %url, path = %dest.display(), "Downloading dataset archive");

        // With OnSuccess the archive only appears under its final name once the
        // body is complete, so a crash mid-transfer cannot satisfy this stage.
        let target = match ctx.config.cleanup {
            CleanupPolicy::Always => dest.clone(),
            CleanupPolicy::OnSuccess => dest.with_extension("tar.part"),
        };

        match self.transport.fetch(&url, &target).await {
            Ok(bytes) => {
                if target != dest {
                    std::fs::rename(&target, &dest)?;
                }
                info!(dataset = %ctx.dataset, bytes, "Download complete");
                Ok(())
            },
            Err(e) => {
                error!(dataset = %ctx.dataset, url = %url, error = %e, "Download failed");
                if target != dest {
                    discard_file(&target);
                }
                Err(e)
            },
        }
    }
}

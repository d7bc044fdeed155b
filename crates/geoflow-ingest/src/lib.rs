//! geoflow ingest library
//!
//! Fetches a GEO series archive, unpacks its per-sample members and splits
//! section-tagged sample files into TSV tables.
//!
//! # Stages
//!
//! - **acquire**: `data/<id>_RAW.tar`
//! - **unpack**: `extracted/<id>/<member>/...`
//! - **segment**: `processed/<id>/<member>/<file>_<tag>.tsv`
//!
//! A stage is skipped when its output already exists, so runs are idempotent
//! and resume after the last completed stage.
//!
//! # Example
//!
//! ```no_run
//! use geoflow_common::DatasetId;
//! use geoflow_ingest::{HttpTransport, IngestConfig, Pipeline, PipelineContext, StageKind};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let transport = Arc::new(HttpTransport::new(&config)?);
//!     let ctx = PipelineContext::new(DatasetId::new("GSE68849")?, config);
//!
//!     let report = Pipeline::new(ctx, transport).run(StageKind::Segment).await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod acquire;
pub mod config;
pub mod layout;
pub mod pipeline;
pub mod segment;
pub mod transport;
pub mod unpack;

pub use config::{CleanupPolicy, IngestConfig};
pub use layout::Layout;
pub use pipeline::{Pipeline, PipelineContext, RunReport, Stage, StageKind, StageOutcome};
pub use transport::{HttpTransport, Transport};

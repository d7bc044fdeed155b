//! geoflow common library
//!
//! Shared error type, logging setup, and identifier types used by every
//! geoflow crate.
//!
//! # Overview
//!
//! - **Error Handling**: [`PipelineError`] covers transport, archive, parse and
//!   schema failures plus the stage wrapper the engine reports
//! - **Logging**: [`logging::init_logging`] wires `tracing` to console and/or
//!   rolling log files
//! - **Types**: [`DatasetId`], the key every stage output is derived from
//!
//! # Example
//!
//! ```no_run
//! use geoflow_common::{DatasetId, Result};
//!
//! fn archive_name(raw: &str) -> Result<String> {
//!     let id = DatasetId::new(raw)?;
//!     Ok(format!("{}_RAW.tar", id))
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use types::DatasetId;

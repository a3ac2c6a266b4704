//! Photo folder optimizer and manifest enricher
//!
//! Scans a directory of photos, writes size-budgeted copies, and keeps a
//! front-matter manifest of photo records in sync, reusing previously derived
//! metadata wherever it is still valid.

mod atomic;

pub mod config;
pub mod enrich;
pub mod error;
pub mod imaging;
pub mod pipeline;
pub mod state;

pub use config::PipelineConfig;
pub use pipeline::{Pipeline, RunMode, RunSummary};

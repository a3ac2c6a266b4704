//! Persistent state
//!
//! - Photo records and their enrichment values (record.rs)
//! - The front-matter manifest file and its writer (manifest.rs)

pub mod manifest;
pub mod record;

pub use manifest::{FrontMatter, Manifest, ManifestStore};
pub use record::{Derived, Dimension, ImageRef, PhotoRecord};

//! Image side of the pipeline
//!
//! - Budgeted re-encoding of source photos (optimizer.rs)
//! - Pruning optimized copies whose source is gone (cleanup.rs)

pub mod cleanup;
pub mod optimizer;

use std::path::Path;

/// Extensions (lowercase) treated as photos
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// Check by extension, case-insensitively
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

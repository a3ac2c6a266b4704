//! Orphaned optimized file cleanup
//!
//! The optimized tree mirrors the source tree. Any optimized image whose
//! source counterpart has disappeared (deleted or renamed) is removed, along
//! with its directory when that leaves it empty.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::is_supported_image;
use crate::error::CleanupError;

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Optimized files removed, relative to the optimized root
    pub removed: Vec<PathBuf>,
}

/// Remove optimized images whose source no longer exists
pub fn clean(source_root: &Path, optimized_root: &Path) -> Result<CleanupReport, CleanupError> {
    info!("Cleaning up orphaned files in {}", optimized_root.display());

    let mut report = CleanupReport::default();
    if !optimized_root.is_dir() {
        debug!("Nothing to clean, {} does not exist", optimized_root.display());
        return Ok(report);
    }

    // Collect first so deleting files and directories doesn't disturb the walk
    let mut candidates = Vec::new();
    for entry in WalkDir::new(optimized_root).sort_by_file_name() {
        let entry = entry.map_err(|source| CleanupError::Walk {
            path: optimized_root.to_path_buf(),
            source,
        })?;

        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            candidates.push(entry.into_path());
        }
    }

    for optimized in candidates {
        let relative = match optimized.strip_prefix(optimized_root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };

        if source_root.join(&relative).exists() {
            continue;
        }

        info!("  Removing orphaned file: {}", relative.display());
        fs::remove_file(&optimized).map_err(|source| CleanupError::Remove {
            path: optimized.clone(),
            source,
        })?;

        if let Some(parent) = optimized.parent() {
            // Fails while the directory still has files; that's expected
            if parent != optimized_root && fs::remove_dir(parent).is_ok() {
                debug!("  Removed empty directory {}", parent.display());
            }
        }

        report.removed.push(relative);
    }

    info!("Cleaned up {} orphaned files", report.removed.len());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"jpeg").unwrap();
    }

    #[test]
    fn test_removes_only_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("photos");
        let optimized = dir.path().join("photos_optimized");

        touch(&source.join("a.jpg"));
        touch(&optimized.join("a.jpg"));
        touch(&optimized.join("b.jpg"));

        let report = clean(&source, &optimized).unwrap();

        assert_eq!(report.removed, vec![PathBuf::from("b.jpg")]);
        assert!(optimized.join("a.jpg").exists());
        assert!(!optimized.join("b.jpg").exists());
        // The root itself is never removed
        assert!(optimized.is_dir());
    }

    #[test]
    fn test_removes_emptied_subdirectory_only() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("photos");
        let optimized = dir.path().join("photos_optimized");

        touch(&source.join("italy/rome.jpg"));
        touch(&optimized.join("italy/rome.jpg"));
        touch(&optimized.join("italy/milan.jpg"));
        touch(&optimized.join("norway/oslo.jpg"));

        let report = clean(&source, &optimized).unwrap();

        assert_eq!(report.removed.len(), 2);
        assert!(optimized.join("italy/rome.jpg").exists());
        assert!(optimized.join("italy").is_dir());
        assert!(!optimized.join("norway").exists());
    }

    #[test]
    fn test_ignores_non_image_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("photos");
        let optimized = dir.path().join("photos_optimized");
        fs::create_dir_all(&source).unwrap();
        touch(&optimized.join("notes.txt"));

        let report = clean(&source, &optimized).unwrap();
        assert!(report.removed.is_empty());
        assert!(optimized.join("notes.txt").exists());
    }

    #[test]
    fn test_missing_optimized_root_is_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = clean(dir.path(), &dir.path().join("absent")).unwrap();
        assert_eq!(report, CleanupReport::default());
    }
}

//! Source photo discovery

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::imaging::is_supported_image;

/// Find all photos under `root`, sorted by path
///
/// Non-recursive scans only look at the root's direct children.
pub fn scan_sources(root: &Path, recursive: bool) -> Result<Vec<PathBuf>, ScanError> {
    if !root.exists() {
        return Err(ScanError::PathNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let walker = WalkDir::new(root).follow_links(true);
    let walker = if recursive { walker } else { walker.max_depth(1) };

    let mut photos = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            photos.push(entry.into_path());
        }
    }

    photos.sort();
    debug!("Found {} photos under {}", photos.len(), root.display());
    Ok(photos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn layout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.PNG", "notes.txt", "nested/c.jpeg", "nested/deeper/d.gif"] {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"x").unwrap();
        }
        dir
    }

    fn names(root: &Path, photos: &[PathBuf]) -> Vec<String> {
        photos
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_recursive_scan_is_sorted() {
        let dir = layout();
        let photos = scan_sources(dir.path(), true).unwrap();
        assert_eq!(
            names(dir.path(), &photos),
            vec!["a.PNG", "b.jpg", "nested/c.jpeg", "nested/deeper/d.gif"]
        );
    }

    #[test]
    fn test_flat_scan() {
        let dir = layout();
        let photos = scan_sources(dir.path(), false).unwrap();
        assert_eq!(names(dir.path(), &photos), vec!["a.PNG", "b.jpg"]);
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(scan_sources(&missing, true), Err(ScanError::PathNotFound(_))));

        let file = dir.path().join("file.jpg");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(scan_sources(&file, true), Err(ScanError::NotADirectory(_))));
    }
}

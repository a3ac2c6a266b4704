//! Whole-file replacement through a sibling temp file

use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Debug)]
pub(crate) enum AtomicWriteError {
    Io(std::io::Error),
    Persist(tempfile::PersistError),
}

impl From<AtomicWriteError> for std::io::Error {
    fn from(e: AtomicWriteError) -> Self {
        match e {
            AtomicWriteError::Io(e) => e,
            AtomicWriteError::Persist(e) => e.error,
        }
    }
}

/// Mode given to files that did not exist before
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

/// Write `bytes` to `path` so that readers see either the old or the new file.
///
/// Parent directories are created as needed. The temp file lives next to the
/// target so the final rename never crosses filesystems. A replaced file keeps
/// its permissions; a new one is world-readable.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AtomicWriteError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(AtomicWriteError::Io)?;

    let mut temp = NamedTempFile::new_in(parent).map_err(AtomicWriteError::Io)?;
    // Temp files are created owner-only
    if let Some(permissions) = target_permissions(path) {
        temp.as_file()
            .set_permissions(permissions)
            .map_err(AtomicWriteError::Io)?;
    }
    temp.write_all(bytes).map_err(AtomicWriteError::Io)?;
    temp.as_file().sync_all().map_err(AtomicWriteError::Io)?;
    temp.persist(path).map_err(AtomicWriteError::Persist)?;
    Ok(())
}

#[cfg(unix)]
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;

    match fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => Some(fs::Permissions::from_mode(NEW_FILE_MODE)),
    }
}

#[cfg(not(unix))]
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    fs::metadata(path).ok().map(|metadata| metadata.permissions())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("out.txt");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        // No temp files left behind
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_new_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        write_atomic(&path, b"jpeg").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos.md");
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o664)).unwrap();

        write_atomic(&path, b"new").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }
}

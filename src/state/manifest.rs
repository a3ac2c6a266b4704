//! Front-matter manifest store
//!
//! The manifest is a text file holding a single YAML front-matter block:
//!
//! ```text
//! ---
//! layout: photos
//! title: Life
//! slug: /photos
//! items:
//! - title: ...
//! ---
//! ```
//!
//! Every write is a full rewrite of the file through a temp file in the same
//! directory followed by a rename, so readers never observe a partial manifest.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::record::PhotoRecord;
use crate::atomic::{write_atomic, AtomicWriteError};
use crate::error::ManifestError;

const DELIMITER: &str = "---";

/// Fixed front-matter fields written above the record list
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FrontMatter {
    pub layout: String,
    pub title: String,
    pub slug: String,
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            layout: "photos".to_string(),
            title: "Life".to_string(),
            slug: "/photos".to_string(),
        }
    }
}

/// Parsed manifest: front matter plus the ordered record list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub front_matter: FrontMatter,
    pub items: Vec<PhotoRecord>,
}

impl Manifest {
    /// Replace the first record with the same title, or append.
    pub fn upsert(&mut self, record: PhotoRecord) {
        match self.items.iter().position(|item| item.title == record.title) {
            Some(index) => {
                debug!("Updated existing item: {}", record.title);
                self.items[index] = record;
            }
            None => {
                debug!("Added new item: {}", record.title);
                self.items.push(record);
            }
        }
    }

    /// Parse a manifest from its text form
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let yaml = front_matter_block(content).ok_or(ManifestError::MissingDelimiters)?;

        // An empty block is a valid, empty manifest
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let document: Document = serde_yaml::from_str(yaml)?;
        Ok(Self {
            front_matter: document.front_matter,
            items: document.items,
        })
    }

    /// Render the full envelope
    pub fn render(&self) -> Result<String, ManifestError> {
        let document = DocumentRef {
            front_matter: &self.front_matter,
            items: &self.items,
        };

        let mut content = String::from(DELIMITER);
        content.push('\n');
        content.push_str(&serde_yaml::to_string(&document)?);
        content.push_str(DELIMITER);
        content.push('\n');
        Ok(content)
    }
}

#[derive(Deserialize)]
struct Document {
    #[serde(flatten)]
    front_matter: FrontMatter,
    #[serde(default)]
    items: Vec<PhotoRecord>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    #[serde(flatten)]
    front_matter: &'a FrontMatter,
    items: &'a [PhotoRecord],
}

/// Text between the opening delimiter line and the next delimiter line
fn front_matter_block(content: &str) -> Option<&str> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let is_delimiter = |line: &str| line.trim_end_matches(['\r', '\n']) == DELIMITER;

    let mut lines = content.split_inclusive('\n');
    let first = lines.next()?;
    if !is_delimiter(first) {
        return None;
    }

    let start = first.len();
    let mut end = start;
    for line in lines {
        if is_delimiter(line) {
            return Some(&content[start..end]);
        }
        end += line.len();
    }
    None
}

/// The manifest file plus the lock that serializes its load-merge-write cycles
pub struct ManifestStore {
    path: PathBuf,
    front_matter: FrontMatter,
    write_lock: Mutex<()>,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>, front_matter: FrontMatter) -> Self {
        Self {
            path: path.into(),
            front_matter,
            write_lock: Mutex::new(()),
        }
    }

    /// Get the path to the manifest file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest.
    ///
    /// A missing or unreadable file yields an empty record list. This is lossy
    /// if the file is only transiently corrupt: the next write replaces it.
    pub fn load(&self) -> Manifest {
        let manifest = self.current();
        info!("Loaded {} existing items from {}", manifest.items.len(), self.path.display());
        manifest
    }

    /// Upsert a single record and rewrite the file
    pub fn upsert(&self, record: PhotoRecord) -> Result<(), ManifestError> {
        info!("Updating {} with item: {}", self.path.display(), record.title);
        self.apply(std::iter::once(record))
    }

    /// Upsert a batch of records in one load-merge-write cycle
    pub fn upsert_batch(&self, records: Vec<PhotoRecord>) -> Result<(), ManifestError> {
        info!("Batch updating {} with {} items", self.path.display(), records.len());
        self.apply(records)
    }

    fn apply(&self, records: impl IntoIterator<Item = PhotoRecord>) -> Result<(), ManifestError> {
        // The guard protects no data, only the file; a poisoned lock is still usable
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Always merge into what is on disk now, not a copy from before other writers
        let mut manifest = self.current();
        for record in records {
            manifest.upsert(record);
        }

        self.write(&manifest)
    }

    fn current(&self) -> Manifest {
        let mut manifest = match self.read() {
            Ok(manifest) => manifest.unwrap_or_default(),
            Err(e) => {
                warn!("Could not load existing {}: {}", self.path.display(), e);
                Manifest::default()
            }
        };
        manifest.front_matter = self.front_matter.clone();
        manifest
    }

    fn read(&self) -> Result<Option<Manifest>, ManifestError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ManifestError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        Manifest::parse(&content).map(Some)
    }

    fn write(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        let content = manifest.render()?;
        write_atomic(&self.path, content.as_bytes()).map_err(|e| match e {
            AtomicWriteError::Io(source) => ManifestError::Io {
                path: self.path.clone(),
                source,
            },
            AtomicWriteError::Persist(source) => ManifestError::Persist {
                path: self.path.clone(),
                source,
            },
        })
    }
}

impl std::fmt::Debug for ManifestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestStore")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::record::Derived;

    fn record(title: &str, sentiment: &str) -> PhotoRecord {
        PhotoRecord {
            title: title.to_string(),
            sentiment: Derived::Found(sentiment.to_string()),
            ..Default::default()
        }
    }

    fn titles(manifest: &Manifest) -> Vec<&str> {
        manifest.items.iter().map(|item| item.title.as_str()).collect()
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path().join("photos.md"), FrontMatter::default());

        let manifest = store.load();
        assert!(manifest.items.is_empty());
        assert_eq!(manifest.front_matter, FrontMatter::default());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos.md");
        fs::write(&path, "---\nitems: [unclosed\n---\n").unwrap();

        let store = ManifestStore::new(&path, FrontMatter::default());
        assert!(store.load().items.is_empty());

        fs::write(&path, "no front matter here").unwrap();
        assert!(store.load().items.is_empty());
    }

    #[test]
    fn test_upsert_replaces_in_place_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path().join("photos.md"), FrontMatter::default());

        store.upsert(record("Paris", "joyful")).unwrap();
        store.upsert(record("Rome", "calm")).unwrap();
        store.upsert(record("Oslo", "cold")).unwrap();
        store.upsert(record("Paris", "serene")).unwrap();

        let manifest = store.load();
        assert_eq!(titles(&manifest), vec!["Paris", "Rome", "Oslo"]);
        assert_eq!(manifest.items[0].sentiment, Derived::Found("serene".to_string()));
    }

    #[test]
    fn test_batch_keeps_call_order_for_new_titles() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path().join("photos.md"), FrontMatter::default());

        store.upsert(record("b", "x")).unwrap();
        store
            .upsert_batch(vec![record("c", "x"), record("b", "y"), record("a", "x")])
            .unwrap();

        let manifest = store.load();
        assert_eq!(titles(&manifest), vec!["b", "c", "a"]);
        assert_eq!(manifest.items[0].sentiment, Derived::Found("y".to_string()));
    }

    #[test]
    fn test_batch_rereads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos.md");
        let first = ManifestStore::new(&path, FrontMatter::default());
        let second = ManifestStore::new(&path, FrontMatter::default());

        first.upsert_batch(vec![record("a", "x")]).unwrap();
        second.upsert_batch(vec![record("b", "x")]).unwrap();

        assert_eq!(titles(&first.load()), vec!["a", "b"]);
    }

    #[test]
    fn test_render_envelope() {
        let manifest = Manifest {
            front_matter: FrontMatter::default(),
            items: vec![record("Paris", "joyful")],
        };

        let content = manifest.render().unwrap();
        assert!(content.starts_with("---\n"));
        assert!(content.ends_with("\n---\n"));
        assert!(content.contains("layout: photos"));
        assert!(content.contains("slug: /photos"));

        assert_eq!(Manifest::parse(&content).unwrap(), manifest);
    }

    #[test]
    fn test_front_matter_block_ignores_inline_dashes() {
        let content = "---\nitems:\n- title: a---b\n---\nbody\n";
        let manifest = Manifest::parse(content).unwrap();
        assert_eq!(manifest.items[0].title, "a---b");
    }

    #[test]
    fn test_configured_front_matter_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos.md");
        let front_matter = FrontMatter {
            layout: "gallery".to_string(),
            title: "Travels".to_string(),
            slug: "/travels".to_string(),
        };
        let store = ManifestStore::new(&path, front_matter.clone());
        store.upsert(record("a", "x")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(Manifest::parse(&content).unwrap().front_matter, front_matter);
    }
}

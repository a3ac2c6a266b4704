//! Error types for the photo pipeline
//!
//! Each stage gets its own enum so the driver can decide what a failure means:
//! per-photo failures are logged and skipped, per-dimension enricher failures
//! become a "nothing found" value, everything else aborts the run.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while optimizing one source image
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// Source could not be opened or its format could not be guessed
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source is not a decodable image
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// JPEG encoder rejected the pixel data
    #[error("Failed to encode at quality {quality}: {source}")]
    Encode {
        quality: u8,
        #[source]
        source: image::ImageError,
    },
}

/// Failure inside a metadata enricher
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("EXIF error in {path}: {source}")]
    Exif {
        path: PathBuf,
        #[source]
        source: exif::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// External tagger could not be spawned or exited non-zero
    #[error("Tagger `{program}` failed: {message}")]
    Command { program: String, message: String },

    /// External tagger printed something that is not a JSON list of strings
    #[error("Tagger `{program}` returned invalid output: {source}")]
    Output {
        program: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure reading or writing the manifest file
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error on manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File does not start with a delimiter line or never closes it
    #[error("Manifest has no front matter delimiters")]
    MissingDelimiters,

    #[error("Failed to replace manifest {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

/// Failure while pruning orphaned optimized files
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to remove orphan {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while enumerating source images
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Source directory not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Failure loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A dimension is enabled for the run but no enricher is configured for it
    #[error("{0} enrichment is enabled but no {0} enricher is configured")]
    MissingEnricher(&'static str),

    #[error("Invalid setting `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Fatal run-level failure
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Optimized copy could not be written (disk full, permissions)
    #[error("Failed to write optimized image {path}: {source}")]
    WriteImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

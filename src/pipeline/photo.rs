//! Work done for a single source photo
//!
//! Optimize (only if no optimized copy exists), derive the filename-based
//! fields, resolve each enrichment dimension against the stored record, and
//! assemble the new record. Runs on a blocking thread.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use super::plan::{plan_field, EnrichmentFlags, FieldPlan};
use crate::atomic::write_atomic;
use crate::enrich::Enrichers;
use crate::error::PipelineError;
use crate::imaging::optimizer::ImageOptimizer;
use crate::state::record::{Derived, Dimension, ImageRef, PhotoRecord};

/// Stored records by title, as read at the start of the run
pub type Snapshot = HashMap<String, PhotoRecord>;

/// Placeholder for a filename with no `city, country` part
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Title used as the manifest key: `-` and `_` read as spaces
pub fn photo_title(stem: &str) -> String {
    stem.replace(['-', '_'], " ")
}

/// `"Paris, France"` gives `("Paris", "France")`; no comma gives unknowns
pub fn parse_location(stem: &str) -> (String, String) {
    let mut parts = stem.split(',');
    match (parts.next(), parts.next()) {
        (Some(city), Some(country)) => (city.trim().to_string(), country.trim().to_string()),
        _ => (UNKNOWN_LOCATION.to_string(), UNKNOWN_LOCATION.to_string()),
    }
}

/// Public URL of the optimized copy, always with `/` separators
pub fn image_src(url_prefix: &str, relative: &Path) -> String {
    let relative: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    format!("{}/{}", url_prefix.trim_end_matches('/'), relative.join("/"))
}

/// Result of processing one photo
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoOutcome {
    Recorded { record: PhotoRecord, optimized: bool },
    /// Photo could not be decoded; nothing is written for it
    Skipped,
}

/// Everything a worker needs, shared read-only across the run
#[derive(Debug, Clone)]
pub struct PhotoContext {
    pub source_root: PathBuf,
    pub optimized_root: PathBuf,
    pub url_prefix: String,
    pub max_size_kb: u64,
    pub optimizer: ImageOptimizer,
    pub enrichers: Enrichers,
    pub flags: EnrichmentFlags,
}

impl PhotoContext {
    /// Process one photo against the run's snapshot
    ///
    /// Only a failed write of the optimized copy is an error; a photo that
    /// cannot be decoded is skipped.
    pub fn process(&self, source: &Path, snapshot: &Snapshot) -> Result<PhotoOutcome, PipelineError> {
        let relative = source
            .strip_prefix(&self.source_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| source.file_name().map(PathBuf::from).unwrap_or_default());
        let stem = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let optimized_path = self.optimized_root.join(&relative);
        let optimized = if optimized_path.exists() {
            debug!("Skipping compression for {}, {} exists", relative.display(), optimized_path.display());
            false
        } else {
            match self.optimizer.optimize(source, self.max_size_kb) {
                Ok(encoded) => {
                    info!(
                        "Optimized {}: {}x{} at quality {} ({:.2}KB)",
                        relative.display(),
                        encoded.width,
                        encoded.height,
                        encoded.quality,
                        encoded.size_kb()
                    );
                    write_atomic(&optimized_path, &encoded.bytes).map_err(|e| PipelineError::WriteImage {
                        path: optimized_path.clone(),
                        source: e.into(),
                    })?;
                    true
                }
                Err(e) => {
                    warn!("Error processing {}: {}", source.display(), e);
                    return Ok(PhotoOutcome::Skipped);
                }
            }
        };

        let title = photo_title(&stem);
        let (city, country) = parse_location(&stem);
        let existing = snapshot.get(&title);

        let mut record = PhotoRecord {
            title: title.clone(),
            image: ImageRef {
                src: image_src(&self.url_prefix, &relative),
                alt: title,
            },
            city,
            country,
            // Keys written by other passes
            extra: existing.map(|record| record.extra.clone()).unwrap_or_default(),
            ..Default::default()
        };

        for dimension in Dimension::ALL {
            let value = self.resolve(dimension, source, existing);
            record.set_field(dimension, value);
        }

        debug!("{} - City: {}, Country: {}", record.title, record.city, record.country);
        Ok(PhotoOutcome::Recorded { record, optimized })
    }

    fn resolve(&self, dimension: Dimension, source: &Path, existing: Option<&PhotoRecord>) -> Derived<String> {
        match plan_field(dimension, self.flags.is_enabled(dimension), existing) {
            FieldPlan::Carry(value) => value,
            FieldPlan::Reuse(value) => {
                debug!("Skipping {} for {}, already computed", dimension, source.display());
                value
            }
            FieldPlan::Compute => self.compute(dimension, source),
        }
    }

    fn compute(&self, dimension: Dimension, source: &Path) -> Derived<String> {
        let value = if dimension == Dimension::Timestamp {
            match self.enrichers.capture_time(source) {
                Some(Ok(Some(timestamp))) if !timestamp.trim().is_empty() => Derived::Found(timestamp),
                Some(Ok(_)) => Derived::Nothing,
                Some(Err(e)) => {
                    warn!("Error extracting timestamp for {}: {}", source.display(), e);
                    Derived::Nothing
                }
                None => Derived::Pending,
            }
        } else {
            match self.enrichers.tags(dimension, source) {
                Some(Ok(tags)) => Derived::from_tags(tags, dimension.separator()),
                Some(Err(e)) => {
                    warn!("Error analyzing {} for {}: {}", dimension, source.display(), e);
                    Derived::Nothing
                }
                None => Derived::Pending,
            }
        };

        if let Derived::Found(text) = &value {
            debug!("{} of {}: {}", dimension, source.display(), text);
        }
        value
    }
}

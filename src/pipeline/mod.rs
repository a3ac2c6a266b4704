//! Pipeline driver
//!
//! One run:
//! 1. Scan the source tree
//! 2. Remove optimized copies whose source is gone
//! 3. Snapshot the manifest by title
//! 4. Process every photo, serially or with a bounded worker pool
//! 5. Upsert the records (per photo when serial, per batch when parallel)
//!
//! Photo work is CPU and disk bound, so it always runs on blocking threads.
//! Workers share only the read-only snapshot and the enricher handles; the
//! manifest file is the single shared mutable resource and every write goes
//! through the store's lock.

pub mod photo;
pub mod plan;
pub mod scan;

use futures::stream::{self, StreamExt};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info, warn};

use self::photo::{PhotoContext, PhotoOutcome, Snapshot};
use self::scan::scan_sources;
use crate::config::PipelineConfig;
use crate::enrich::Enrichers;
use crate::error::{ConfigError, PipelineError};
use crate::imaging::cleanup;
use crate::imaging::optimizer::ImageOptimizer;
use crate::state::manifest::ManifestStore;
use crate::state::record::PhotoRecord;

/// How photos are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One photo at a time; the manifest is rewritten after each
    Serial,
    /// Up to `workers` photos in flight; the manifest is rewritten every `batch_size` completions
    Parallel { workers: usize, batch_size: usize },
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub recorded: usize,
    pub skipped: usize,
    pub optimized: usize,
    pub orphans_removed: usize,
}

impl RunSummary {
    fn count(&mut self, outcome: &PhotoOutcome) {
        match outcome {
            PhotoOutcome::Recorded { optimized, .. } => {
                self.recorded += 1;
                if *optimized {
                    self.optimized += 1;
                }
            }
            PhotoOutcome::Skipped => self.skipped += 1,
        }
    }
}

pub struct Pipeline {
    context: Arc<PhotoContext>,
    store: Arc<ManifestStore>,
    mode: RunMode,
    recursive: bool,
}

impl Pipeline {
    /// Build a pipeline from validated settings
    ///
    /// Fails before any work if an enabled dimension has no enricher.
    pub fn new(config: &PipelineConfig, enrichers: Enrichers) -> Result<Self, ConfigError> {
        config.validate()?;
        enrichers.check(config.enrich.flags.enabled())?;

        let mode = if config.serial {
            RunMode::Serial
        } else {
            RunMode::Parallel {
                workers: config.workers,
                batch_size: config.batch_size,
            }
        };

        let context = PhotoContext {
            source_root: config.source_dir.clone(),
            optimized_root: config.optimized_dir.clone(),
            url_prefix: config.url_prefix.clone(),
            max_size_kb: config.max_size_kb,
            optimizer: ImageOptimizer::new(config.max_dimension),
            enrichers,
            flags: config.enrich.flags,
        };

        Ok(Self {
            context: Arc::new(context),
            store: Arc::new(ManifestStore::new(&config.manifest, config.front_matter.clone())),
            mode,
            recursive: config.recursive,
        })
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let source_root = self.context.source_root.clone();
        let optimized_root = self.context.optimized_root.clone();

        let photos = scan_sources(&source_root, self.recursive)?;
        let mut summary = RunSummary {
            discovered: photos.len(),
            ..Default::default()
        };
        info!("Found {} images to process ({:?})", photos.len(), self.mode);

        fs::create_dir_all(&optimized_root).map_err(|source| PipelineError::WriteImage {
            path: optimized_root.clone(),
            source,
        })?;
        let report = task::spawn_blocking(move || cleanup::clean(&source_root, &optimized_root)).await??;
        summary.orphans_removed = report.removed.len();

        let store = Arc::clone(&self.store);
        let manifest = task::spawn_blocking(move || store.load()).await?;
        // Duplicate titles: the later record wins the lookup
        let snapshot: Arc<Snapshot> = Arc::new(
            manifest
                .items
                .into_iter()
                .map(|record| (record.title.clone(), record))
                .collect(),
        );

        match self.mode {
            RunMode::Serial => self.run_serial(photos, snapshot, &mut summary).await?,
            RunMode::Parallel { workers, batch_size } => {
                self.run_parallel(photos, snapshot, workers, batch_size, &mut summary)
                    .await?
            }
        }

        info!(
            "Processed {} photos: {} recorded, {} skipped, {} optimized, {} orphans removed",
            summary.discovered, summary.recorded, summary.skipped, summary.optimized, summary.orphans_removed
        );
        Ok(summary)
    }

    async fn run_serial(
        &self,
        photos: Vec<PathBuf>,
        snapshot: Arc<Snapshot>,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let total = photos.len();
        for (index, source) in photos.into_iter().enumerate() {
            let outcome = self.process_one(source, index, total, Arc::clone(&snapshot)).await?;
            summary.count(&outcome);

            if let PhotoOutcome::Recorded { record, .. } = outcome {
                let store = Arc::clone(&self.store);
                task::spawn_blocking(move || store.upsert(record)).await??;
            }
        }
        Ok(())
    }

    async fn run_parallel(
        &self,
        photos: Vec<PathBuf>,
        snapshot: Arc<Snapshot>,
        workers: usize,
        batch_size: usize,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let total = photos.len();
        let mut completed = stream::iter(photos.into_iter().enumerate())
            .map(|(index, source)| self.process_one(source, index, total, Arc::clone(&snapshot)))
            .buffer_unordered(workers.max(1));

        let mut pending: Vec<PhotoRecord> = Vec::with_capacity(batch_size);
        while let Some(outcome) = completed.next().await {
            let outcome = outcome?;
            summary.count(&outcome);

            if let PhotoOutcome::Recorded { record, .. } = outcome {
                pending.push(record);
                if pending.len() >= batch_size {
                    self.flush(std::mem::take(&mut pending)).await?;
                }
            }
        }

        if !pending.is_empty() {
            self.flush(pending).await?;
        }
        Ok(())
    }

    async fn flush(&self, records: Vec<PhotoRecord>) -> Result<(), PipelineError> {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || store.upsert_batch(records)).await??;
        Ok(())
    }

    /// Process one photo on a blocking thread
    ///
    /// A panicked worker counts as a skipped photo.
    async fn process_one(
        &self,
        source: PathBuf,
        index: usize,
        total: usize,
        snapshot: Arc<Snapshot>,
    ) -> Result<PhotoOutcome, PipelineError> {
        let name = source.display().to_string();
        info!("Processing {} ({}/{})", name, index + 1, total);

        let context = Arc::clone(&self.context);
        match task::spawn_blocking(move || context.process(&source, &snapshot)).await {
            Ok(result) => {
                if let Ok(PhotoOutcome::Skipped) = &result {
                    debug!("No record for {}", name);
                }
                result
            }
            Err(e) => {
                warn!("Worker processing {} failed: {}", name, e);
                Ok(PhotoOutcome::Skipped)
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("context", &self.context)
            .field("store", &self.store)
            .field("mode", &self.mode)
            .field("recursive", &self.recursive)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::plan::EnrichmentFlags;
    use image::{Rgb, RgbImage};
    use std::path::Path;

    fn config(root: &Path) -> PipelineConfig {
        PipelineConfig {
            source_dir: root.join("photos"),
            optimized_dir: root.join("photos_optimized"),
            manifest: root.join("photos.md"),
            ..Default::default()
        }
    }

    fn write_photo(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(16, 12, Rgb([200, 30, 30])).save(path).unwrap();
    }

    #[test]
    fn test_enabled_dimension_without_enricher_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.enrich.flags = EnrichmentFlags {
            objects: true,
            ..Default::default()
        };

        let err = Pipeline::new(&config, Enrichers::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnricher("objects")));
    }

    #[test]
    fn test_mode_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        let pipeline = Pipeline::new(&config, Enrichers::default()).unwrap();
        assert_eq!(pipeline.mode(), RunMode::Parallel { workers: 4, batch_size: 10 });

        config.serial = true;
        let pipeline = Pipeline::new(&config, Enrichers::default()).unwrap();
        assert_eq!(pipeline.mode(), RunMode::Serial);
    }

    #[tokio::test]
    async fn test_missing_source_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(&config(dir.path()), Enrichers::default()).unwrap();
        assert!(matches!(pipeline.run().await, Err(PipelineError::Scan(_))));
    }

    #[tokio::test]
    async fn test_run_summary() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        write_photo(&config.source_dir.join("Paris, France.png"));
        write_photo(&config.source_dir.join("sunset.png"));
        fs::write(config.source_dir.join("broken.jpg"), b"nope").unwrap();
        fs::create_dir_all(&config.optimized_dir).unwrap();
        fs::write(config.optimized_dir.join("gone.jpg"), b"old").unwrap();

        let pipeline = Pipeline::new(&config, Enrichers::default()).unwrap();
        let summary = pipeline.run().await.unwrap();

        assert_eq!(
            summary,
            RunSummary {
                discovered: 3,
                recorded: 2,
                skipped: 1,
                optimized: 2,
                orphans_removed: 1,
            }
        );
        assert_eq!(pipeline.store().load().items.len(), 2);
    }
}

//! Metadata enrichers
//!
//! Each enrichment dimension is produced by a collaborator behind a trait so the
//! pipeline never cares whether a result comes from EXIF parsing, a pixel
//! histogram or an external model. Handles are built once per run and shared
//! between workers through `Arc`, so expensive setup is never repeated per photo.
//!
//! `Ok(None)` and `Ok(Some(vec![]))` both mean "looked, found nothing".

pub mod command;
pub mod exif;
pub mod palette;

use std::path::Path;
use std::sync::Arc;

use crate::error::{ConfigError, EnrichError};
use crate::state::record::Dimension;

pub use self::command::CommandTagger;
pub use self::exif::ExifTimestampExtractor;
pub use self::palette::PaletteColorAnalyzer;

/// Labels for things visible in a photo
pub trait ObjectDetector: Send + Sync {
    fn detect_objects(
        &self,
        image: &Path,
        model_size: &str,
        image_dimension: u32,
    ) -> Result<Option<Vec<String>>, EnrichError>;
}

/// Familiar colour names dominating a photo
pub trait ColorAnalyzer: Send + Sync {
    fn analyze_colors(&self, image: &Path) -> Result<Option<Vec<String>>, EnrichError>;
}

/// Mood tags for a photo
pub trait SentimentAnalyzer: Send + Sync {
    fn analyze_sentiment(
        &self,
        image: &Path,
        confidence_threshold: f32,
    ) -> Result<Option<Vec<String>>, EnrichError>;
}

/// Capture time, formatted `YYYY-MM-DD HH:MM:SS`
pub trait TimestampExtractor: Send + Sync {
    fn extract_timestamp(&self, image: &Path) -> Result<Option<String>, EnrichError>;
}

/// Parameters forwarded to the model-backed enrichers
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub object_model_size: String,
    pub object_image_size: u32,
    pub sentiment_confidence: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            object_model_size: "l".to_string(),
            object_image_size: 640,
            sentiment_confidence: 0.2,
        }
    }
}

/// The set of enricher handles available to a run
#[derive(Clone, Default)]
pub struct Enrichers {
    pub objects: Option<Arc<dyn ObjectDetector>>,
    pub colors: Option<Arc<dyn ColorAnalyzer>>,
    pub sentiment: Option<Arc<dyn SentimentAnalyzer>>,
    pub timestamp: Option<Arc<dyn TimestampExtractor>>,
    pub params: ModelParams,
}

impl Enrichers {
    pub fn with_objects(mut self, detector: impl ObjectDetector + 'static) -> Self {
        self.objects = Some(Arc::new(detector));
        self
    }

    pub fn with_colors(mut self, analyzer: impl ColorAnalyzer + 'static) -> Self {
        self.colors = Some(Arc::new(analyzer));
        self
    }

    pub fn with_sentiment(mut self, analyzer: impl SentimentAnalyzer + 'static) -> Self {
        self.sentiment = Some(Arc::new(analyzer));
        self
    }

    pub fn with_timestamp(mut self, extractor: impl TimestampExtractor + 'static) -> Self {
        self.timestamp = Some(Arc::new(extractor));
        self
    }

    pub fn has(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::Sentiment => self.sentiment.is_some(),
            Dimension::Color => self.colors.is_some(),
            Dimension::Objects => self.objects.is_some(),
            Dimension::Timestamp => self.timestamp.is_some(),
        }
    }

    /// Every enabled dimension must have a handle
    pub fn check(&self, enabled: impl IntoIterator<Item = Dimension>) -> Result<(), ConfigError> {
        for dimension in enabled {
            if !self.has(dimension) {
                return Err(ConfigError::MissingEnricher(dimension.name()));
            }
        }
        Ok(())
    }

    /// Run the enricher for a tag dimension
    ///
    /// Returns `None` when no handle is configured for it. Timestamps are not
    /// tags and go through [`Enrichers::capture_time`].
    pub(crate) fn tags(&self, dimension: Dimension, image: &Path) -> Option<Result<Option<Vec<String>>, EnrichError>> {
        match dimension {
            Dimension::Sentiment => self
                .sentiment
                .as_ref()
                .map(|analyzer| analyzer.analyze_sentiment(image, self.params.sentiment_confidence)),
            Dimension::Color => self.colors.as_ref().map(|analyzer| analyzer.analyze_colors(image)),
            Dimension::Objects => self.objects.as_ref().map(|detector| {
                detector.detect_objects(image, &self.params.object_model_size, self.params.object_image_size)
            }),
            Dimension::Timestamp => None,
        }
    }

    pub(crate) fn capture_time(&self, image: &Path) -> Option<Result<Option<String>, EnrichError>> {
        self.timestamp.as_ref().map(|extractor| extractor.extract_timestamp(image))
    }
}

impl std::fmt::Debug for Enrichers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enrichers")
            .field("objects", &self.objects.is_some())
            .field("colors", &self.colors.is_some())
            .field("sentiment", &self.sentiment.is_some())
            .field("timestamp", &self.timestamp.is_some())
            .field("params", &self.params)
            .finish()
    }
}

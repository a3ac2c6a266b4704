//! Configuration loading
//!
//! Settings come from a TOML file, resolved in priority order:
//! 1. Explicit path (`--config` / `PHOTO_PIPELINE_CONFIG`)
//! 2. `./photo-pipeline.toml`
//! 3. `<user config dir>/photo-pipeline/config.toml`
//! 4. Compiled defaults
//!
//! Every field has a default, so a partial file (or none at all) is fine.
//! Command-line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::enrich::{
    CommandTagger, Enrichers, ExifTimestampExtractor, ModelParams, PaletteColorAnalyzer,
};
use crate::enrich::palette::DEFAULT_MIN_PERCENTAGE;
use crate::error::ConfigError;
use crate::imaging::optimizer::DEFAULT_MAX_DIMENSION;
use crate::pipeline::plan::EnrichmentFlags;
use crate::state::manifest::FrontMatter;

/// File name looked for in the working directory
pub const LOCAL_CONFIG_FILE: &str = "photo-pipeline.toml";

/// Object detector model sizes, smallest to largest
const MODEL_SIZES: [&str; 5] = ["n", "s", "m", "l", "x"];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the original photos
    pub source_dir: PathBuf,
    /// Mirror directory for optimized copies
    pub optimized_dir: PathBuf,
    /// Front-matter manifest file
    pub manifest: PathBuf,
    /// Public URL the optimized directory is served from
    pub url_prefix: String,
    pub max_size_kb: u64,
    pub max_dimension: u32,
    pub workers: usize,
    /// Records written per manifest rewrite in parallel mode
    pub batch_size: usize,
    /// One photo at a time, manifest rewritten after each
    pub serial: bool,
    pub recursive: bool,
    pub front_matter: FrontMatter,
    pub enrich: EnrichConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("assets/img/photos"),
            optimized_dir: PathBuf::from("assets/img/photos_optimized"),
            manifest: PathBuf::from("photos.md"),
            url_prefix: "/assets/img/photos_optimized".to_string(),
            max_size_kb: 500,
            max_dimension: DEFAULT_MAX_DIMENSION,
            workers: 4,
            batch_size: 10,
            serial: false,
            recursive: true,
            front_matter: FrontMatter::default(),
            enrich: EnrichConfig::default(),
        }
    }
}

/// Which dimensions run, and how their enrichers are built
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EnrichConfig {
    #[serde(flatten)]
    pub flags: EnrichmentFlags,
    pub color_min_percentage: f32,
    pub object_model_size: String,
    pub object_image_size: u32,
    pub sentiment_confidence: f32,
    /// External object detector; object detection needs one
    pub object_command: Option<CommandTagger>,
    /// External mood classifier; sentiment analysis needs one
    pub sentiment_command: Option<CommandTagger>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        let params = ModelParams::default();
        Self {
            flags: EnrichmentFlags::default(),
            color_min_percentage: DEFAULT_MIN_PERCENTAGE,
            object_model_size: params.object_model_size,
            object_image_size: params.object_image_size,
            sentiment_confidence: params.sentiment_confidence,
            object_command: None,
            sentiment_command: None,
        }
    }
}

impl EnrichConfig {
    /// Construct the enricher handles for a run
    ///
    /// Timestamp and colour enrichers are built in; the model-backed ones exist
    /// only when a command is configured.
    pub fn build_enrichers(&self) -> Enrichers {
        let mut enrichers = Enrichers {
            params: ModelParams {
                object_model_size: self.object_model_size.clone(),
                object_image_size: self.object_image_size,
                sentiment_confidence: self.sentiment_confidence,
            },
            ..Default::default()
        }
        .with_timestamp(ExifTimestampExtractor::new())
        .with_colors(PaletteColorAnalyzer::new(self.color_min_percentage));

        if let Some(command) = &self.object_command {
            enrichers = enrichers.with_objects(command.clone());
        }
        if let Some(command) = &self.sentiment_command {
            enrichers = enrichers.with_sentiment(command.clone());
        }
        enrichers
    }
}

impl PipelineConfig {
    /// Load from the first config file found, or defaults
    ///
    /// An explicit path must exist; the implicit locations are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        for candidate in default_locations() {
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject settings that would make the run meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size_kb == 0 {
            return Err(invalid("max_size_kb", "must be at least 1"));
        }
        if self.max_dimension == 0 {
            return Err(invalid("max_dimension", "must be at least 1"));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if !MODEL_SIZES.contains(&self.enrich.object_model_size.as_str()) {
            return Err(invalid(
                "enrich.object_model_size",
                format!("expected one of {:?}, got {:?}", MODEL_SIZES, self.enrich.object_model_size),
            ));
        }
        if !(0.0..=1.0).contains(&self.enrich.sentiment_confidence) {
            return Err(invalid("enrich.sentiment_confidence", "must be between 0 and 1"));
        }
        Ok(())
    }
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.into(),
    }
}

/// Implicit config file locations, highest priority first
fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("photo-pipeline").join("config.toml"));
    }
    locations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::record::Dimension;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.source_dir, PathBuf::from("assets/img/photos"));
        assert_eq!(config.optimized_dir, PathBuf::from("assets/img/photos_optimized"));
        assert_eq!(config.manifest, PathBuf::from("photos.md"));
        assert_eq!(config.max_size_kb, 500);
        assert_eq!(config.max_dimension, 1200);
        assert_eq!(config.workers, 4);
        assert_eq!(config.batch_size, 10);
        assert!(config.recursive);
        assert!(!config.serial);
        assert_eq!(config.enrich.flags, EnrichmentFlags::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo-pipeline.toml");
        fs::write(
            &path,
            r#"
max_size_kb = 300
workers = 8

[front_matter]
title = "Travels"

[enrich]
color = true
timestamp = true
object_model_size = "n"

[enrich.object_command]
program = "detect-objects"
args = ["--json"]
"#,
        )
        .unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_size_kb, 300);
        assert_eq!(config.workers, 8);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.front_matter.title, "Travels");
        assert_eq!(config.front_matter.layout, "photos");
        assert!(config.enrich.flags.color);
        assert!(config.enrich.flags.timestamp);
        assert!(!config.enrich.flags.sentiment);
        assert_eq!(config.enrich.object_model_size, "n");
        assert_eq!(
            config.enrich.object_command,
            Some(CommandTagger::new("detect-objects", ["--json"]))
        );
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PipelineConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "workers = \"many\"").unwrap();
        assert!(matches!(PipelineConfig::load(Some(&path)), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validation() {
        let config = PipelineConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { key: "workers", .. })));

        let mut config = PipelineConfig::default();
        config.enrich.object_model_size = "xxl".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "enrich.object_model_size", .. })
        ));
    }

    #[test]
    fn test_built_in_enrichers() {
        let enrichers = EnrichConfig::default().build_enrichers();
        assert!(enrichers.has(Dimension::Timestamp));
        assert!(enrichers.has(Dimension::Color));
        assert!(!enrichers.has(Dimension::Objects));
        assert!(!enrichers.has(Dimension::Sentiment));
    }
}

//! Model-backed tagging through an external program
//!
//! The object detector and mood classifier are heavyweight models that live
//! outside this crate. A tagger is invoked as
//!
//! ```text
//! <program> <args..> <image> <extra args..>
//! ```
//!
//! and must print a JSON array of strings (or `null`) on stdout.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::{ObjectDetector, SentimentAnalyzer};
use crate::error::EnrichError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTagger {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTagger {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn run(&self, image: &Path, extra: &[String]) -> Result<Option<Vec<String>>, EnrichError> {
        debug!("Running {} on {}", self.program, image.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .args(extra)
            .output()
            .map_err(|e| EnrichError::Command {
                program: self.program.clone(),
                message: format!("failed to execute: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnrichError::Command {
                program: self.program.clone(),
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(None);
        }

        serde_json::from_str(stdout).map_err(|source| EnrichError::Output {
            program: self.program.clone(),
            source,
        })
    }
}

impl ObjectDetector for CommandTagger {
    fn detect_objects(
        &self,
        image: &Path,
        model_size: &str,
        image_dimension: u32,
    ) -> Result<Option<Vec<String>>, EnrichError> {
        let extra = [
            "--model-size".to_string(),
            model_size.to_string(),
            "--image-size".to_string(),
            image_dimension.to_string(),
        ];
        self.run(image, &extra)
    }
}

impl SentimentAnalyzer for CommandTagger {
    fn analyze_sentiment(
        &self,
        image: &Path,
        confidence_threshold: f32,
    ) -> Result<Option<Vec<String>>, EnrichError> {
        let extra = ["--confidence-threshold".to_string(), confidence_threshold.to_string()];
        self.run(image, &extra)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> CommandTagger {
        // Positional parameters after the script start at $0
        CommandTagger::new("sh", ["-c", script, "tagger"])
    }

    #[test]
    fn test_parses_json_list() {
        let tagger = shell(r#"echo '["person", "dog"]'"#);
        let tags = tagger.detect_objects(Path::new("photo.jpg"), "l", 640).unwrap();
        assert_eq!(tags, Some(vec!["person".to_string(), "dog".to_string()]));
    }

    #[test]
    fn test_forwards_image_and_model_arguments() {
        let tagger = shell(r#"printf '["%s","%s","%s","%s","%s"]' "$1" "$2" "$3" "$4" "$5""#);
        let tags = tagger.detect_objects(Path::new("a/photo.jpg"), "n", 320).unwrap().unwrap();
        assert_eq!(tags, vec!["a/photo.jpg", "--model-size", "n", "--image-size", "320"]);
    }

    #[test]
    fn test_forwards_confidence_threshold() {
        let tagger = shell(r#"printf '["%s","%s"]' "$2" "$3""#);
        let tags = tagger.analyze_sentiment(Path::new("photo.jpg"), 0.2).unwrap().unwrap();
        assert_eq!(tags, vec!["--confidence-threshold", "0.2"]);
    }

    #[test]
    fn test_null_and_empty_output_mean_nothing() {
        assert_eq!(shell("echo null").detect_objects(Path::new("p.jpg"), "l", 640).unwrap(), None);
        assert_eq!(shell("true").detect_objects(Path::new("p.jpg"), "l", 640).unwrap(), None);
    }

    #[test]
    fn test_failures_are_errors() {
        let failing = shell("echo boom >&2; exit 3");
        assert!(matches!(
            failing.analyze_sentiment(Path::new("p.jpg"), 0.2),
            Err(EnrichError::Command { .. })
        ));

        let garbage = shell("echo not json");
        assert!(matches!(
            garbage.analyze_sentiment(Path::new("p.jpg"), 0.2),
            Err(EnrichError::Output { .. })
        ));

        let missing = CommandTagger::new("/nonexistent/tagger", Vec::<String>::new());
        assert!(matches!(
            missing.detect_objects(Path::new("p.jpg"), "l", 640),
            Err(EnrichError::Command { .. })
        ));
    }
}

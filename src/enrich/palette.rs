//! Dominant colour tags from a fixed palette of familiar names
//!
//! Every pixel of a downsampled copy is snapped to its nearest palette entry
//! (Euclidean distance in RGB) and the entries covering at least
//! `min_percentage` of the image become tags, most dominant first.

use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use std::path::Path;

use super::ColorAnalyzer;
use crate::error::EnrichError;

/// Names a visitor would search for
const FAMILIAR_COLORS: [(&str, [u8; 3]); 19] = [
    ("red", [255, 0, 0]),
    ("orange", [255, 165, 0]),
    ("yellow", [255, 255, 0]),
    ("green", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("purple", [128, 0, 128]),
    ("pink", [255, 192, 203]),
    ("brown", [139, 69, 19]),
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("gray", [128, 128, 128]),
    ("navy", [0, 0, 128]),
    ("teal", [0, 128, 128]),
    ("maroon", [128, 0, 0]),
    ("olive", [128, 128, 0]),
    ("silver", [192, 192, 192]),
    ("gold", [255, 215, 0]),
    ("beige", [245, 245, 220]),
    ("turquoise", [64, 224, 208]),
];

/// Analysis canvas bounds
const SAMPLE_WIDTH: u32 = 800;
const SAMPLE_HEIGHT: u32 = 600;

/// Channel sums at or beyond these are treated as noise
const DARK_SUM: u32 = 30;
const BRIGHT_SUM: u32 = 735;

pub const DEFAULT_MIN_PERCENTAGE: f32 = 5.0;

#[derive(Debug, Clone, Copy)]
pub struct PaletteColorAnalyzer {
    min_percentage: f32,
}

impl Default for PaletteColorAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PERCENTAGE)
    }
}

impl PaletteColorAnalyzer {
    pub fn new(min_percentage: f32) -> Self {
        Self {
            min_percentage: min_percentage.max(0.0),
        }
    }

    /// Tag an already decoded image
    pub fn analyze_pixels(&self, image: &RgbImage) -> Vec<String> {
        let all: Vec<[u8; 3]> = image.pixels().map(|pixel| pixel.0).collect();
        if all.is_empty() {
            return Vec::new();
        }

        // Drop near-black and near-white pixels, unless that leaves too little to judge
        let mid: Vec<[u8; 3]> = all
            .iter()
            .copied()
            .filter(|rgb| {
                let sum = channel_sum(rgb);
                sum > DARK_SUM && sum < BRIGHT_SUM
            })
            .collect();
        let pixels = if mid.len() * 10 > all.len() { mid } else { all };

        let mut counts = [0usize; FAMILIAR_COLORS.len()];
        for rgb in &pixels {
            counts[nearest_color(rgb)] += 1;
        }

        let total = pixels.len() as f32;
        let mut ranked: Vec<(usize, usize)> = counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0 && count as f32 * 100.0 / total >= self.min_percentage)
            .map(|(index, &count)| (index, count))
            .collect();
        // Stable sort keeps palette order for equal shares
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        ranked
            .into_iter()
            .map(|(index, _)| FAMILIAR_COLORS[index].0.to_string())
            .collect()
    }
}

impl ColorAnalyzer for PaletteColorAnalyzer {
    fn analyze_colors(&self, image: &Path) -> Result<Option<Vec<String>>, EnrichError> {
        let decoded = ImageReader::open(image)
            .map_err(|source| EnrichError::Io {
                path: image.to_path_buf(),
                source,
            })?
            .with_guessed_format()
            .map_err(|source| EnrichError::Io {
                path: image.to_path_buf(),
                source,
            })?
            .decode()
            .map_err(|source| EnrichError::Image {
                path: image.to_path_buf(),
                source,
            })?;

        let sample = if decoded.width() > SAMPLE_WIDTH || decoded.height() > SAMPLE_HEIGHT {
            decoded.resize(SAMPLE_WIDTH, SAMPLE_HEIGHT, FilterType::Triangle)
        } else {
            decoded
        };

        Ok(Some(self.analyze_pixels(&sample.to_rgb8())))
    }
}

fn channel_sum(rgb: &[u8; 3]) -> u32 {
    rgb.iter().map(|&c| u32::from(c)).sum()
}

/// Index of the closest palette entry; the earlier entry wins ties
fn nearest_color(rgb: &[u8; 3]) -> usize {
    let mut best = 0;
    let mut best_distance = u32::MAX;
    for (index, (_, reference)) in FAMILIAR_COLORS.iter().enumerate() {
        let distance: u32 = rgb
            .iter()
            .zip(reference)
            .map(|(&a, &b)| {
                let d = i32::from(a) - i32::from(b);
                (d * d) as u32
            })
            .sum();
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

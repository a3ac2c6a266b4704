//! Capture timestamp from EXIF metadata
//!
//! Preference order:
//! 1. `DateTimeOriginal`
//! 2. `DateTimeDigitized`
//! 3. Any other date/time tag, favouring names mentioning original/create/capture
//! 4. `DateTime`, the last-modified stamp, when nothing else parses
//!
//! The file's modification time is never used; a photo without EXIF dates has
//! no capture time.

use chrono::{NaiveDate, NaiveDateTime};
use exif::{In, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use super::TimestampExtractor;
use crate::error::EnrichError;

/// Output layout for manifest timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Datetime layouts seen in the wild, tried in order
const DATETIME_FORMATS: [&str; 11] = [
    "%Y:%m:%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y:%m:%d %H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y%m%d_%H%M%S",
];

/// Date-only layouts; midnight is assumed
const DATE_FORMATS: [&str; 5] = ["%Y:%m:%d", "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"];

/// Parse one EXIF-ish datetime string
pub fn parse_exif_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim().trim_end_matches('\0');
    if text.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S").ok())
}

/// Reads capture time from the primary EXIF IFD
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifTimestampExtractor;

impl ExifTimestampExtractor {
    pub fn new() -> Self {
        Self
    }

    fn read(&self, image: &Path) -> Result<Option<exif::Exif>, EnrichError> {
        let file = File::open(image).map_err(|source| EnrichError::Io {
            path: image.to_path_buf(),
            source,
        })?;

        match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
            Ok(data) => Ok(Some(data)),
            Err(exif::Error::NotFound(_) | exif::Error::NotSupported(_) | exif::Error::BlankValue(_)) => Ok(None),
            Err(exif::Error::Io(source)) => Err(EnrichError::Io {
                path: image.to_path_buf(),
                source,
            }),
            Err(source) => Err(EnrichError::Exif {
                path: image.to_path_buf(),
                source,
            }),
        }
    }
}

impl TimestampExtractor for ExifTimestampExtractor {
    fn extract_timestamp(&self, image: &Path) -> Result<Option<String>, EnrichError> {
        let Some(data) = self.read(image)? else {
            debug!("No EXIF data in {}", image.display());
            return Ok(None);
        };

        let primary = [Tag::DateTimeOriginal, Tag::DateTimeDigitized]
            .into_iter()
            .find_map(|tag| data.get_field(tag, In::PRIMARY).and_then(|field| ascii_datetime(&field.value)));

        let timestamp = primary.or_else(|| {
            // Any other field whose tag name looks like a date or time
            let mut candidates: Vec<(Tag, String, NaiveDateTime)> = data
                .fields()
                .filter_map(|field| {
                    let name = field.tag.to_string().to_lowercase();
                    if !(name.contains("date") || name.contains("time")) {
                        return None;
                    }
                    ascii_datetime(&field.value).map(|parsed| (field.tag, name, parsed))
                })
                .collect();
            // Stable sort: DateTime goes last, everything else keeps file order
            candidates.sort_by_key(|(tag, _, _)| *tag == Tag::DateTime);

            candidates
                .iter()
                .find(|(_, name, _)| ["original", "create", "capture"].iter().any(|key| name.contains(key)))
                .or_else(|| candidates.first())
                .map(|(_, _, parsed)| *parsed)
        });

        Ok(timestamp.map(|parsed| parsed.format(TIMESTAMP_FORMAT).to_string()))
    }
}

fn ascii_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Ascii(parts) => parts
            .iter()
            .find_map(|bytes| parse_exif_datetime(&String::from_utf8_lossy(bytes))),
        _ => None,
    }
}

/// Splice an Exif APP1 segment holding `fields` right after a JPEG's SOI marker
#[cfg(test)]
pub(crate) fn jpeg_with_exif(jpeg: &[u8], fields: &[exif::Field]) -> Vec<u8> {
    let mut writer = exif::experimental::Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut tiff = std::io::Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend_from_slice(&tiff);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&segment);
    out.extend_from_slice(&jpeg[2..]);
    out
}

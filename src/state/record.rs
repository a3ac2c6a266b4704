//! Photo record data model
//!
//! These structs are what flows between the pipeline and the manifest file.
//! Enrichment fields are held as [`Derived`] values in memory and only turned
//! into the manifest's textual conventions at the serde boundary:
//!
//! | state     | sentiment / color / objects | timestamp   |
//! |-----------|-----------------------------|-------------|
//! | `Pending` | `""`                        | `""`        |
//! | `Nothing` | `"None"`                    | key omitted |
//! | `Found`   | stored text                 | stored text |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Marker written for "computed, found nothing" on tag dimensions
pub const NOTHING_MARKER: &str = "None";

/// Outcome of an enrichment dimension for one photo
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Derived<T> {
    /// Never computed (or the dimension was disabled with no prior record)
    #[default]
    Pending,
    /// Computed, nothing found
    Nothing,
    /// Computed value, stored verbatim
    Found(T),
}

impl<T> Derived<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Derived::Pending)
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Derived::Nothing)
    }

    pub fn found(&self) -> Option<&T> {
        match self {
            Derived::Found(value) => Some(value),
            _ => None,
        }
    }
}

impl Derived<String> {
    /// Build a tag field from an enricher result, joining with `separator`.
    ///
    /// Blank tags are dropped; an empty or missing list becomes `Nothing`.
    pub fn from_tags(tags: Option<Vec<String>>, separator: &str) -> Self {
        let tags: Vec<String> = tags
            .unwrap_or_default()
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        if tags.is_empty() {
            Derived::Nothing
        } else {
            Derived::Found(tags.join(separator))
        }
    }
}

/// The four enrichment dimensions a run can toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Sentiment,
    Color,
    Objects,
    Timestamp,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Sentiment,
        Dimension::Color,
        Dimension::Objects,
        Dimension::Timestamp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Sentiment => "sentiment",
            Dimension::Color => "color",
            Dimension::Objects => "objects",
            Dimension::Timestamp => "timestamp",
        }
    }

    /// Join separator used when writing a tag list
    pub fn separator(self) -> &'static str {
        match self {
            Dimension::Objects => ",",
            _ => ", ",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the optimized copy is served from
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRef {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub alt: String,
}

/// One photo's manifest entry, addressed by `title`
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PhotoRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image: ImageRef,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, with = "tag_text")]
    pub sentiment: Derived<String>,
    #[serde(default, with = "tag_text")]
    pub objects: Derived<String>,
    #[serde(default, with = "tag_text")]
    pub color: Derived<String>,
    #[serde(
        default = "missing_timestamp",
        with = "timestamp_text",
        skip_serializing_if = "Derived::is_nothing"
    )]
    pub timestamp: Derived<String>,
    /// Keys written by other passes; carried through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl PhotoRecord {
    pub fn field(&self, dimension: Dimension) -> &Derived<String> {
        match dimension {
            Dimension::Sentiment => &self.sentiment,
            Dimension::Color => &self.color,
            Dimension::Objects => &self.objects,
            Dimension::Timestamp => &self.timestamp,
        }
    }

    pub fn set_field(&mut self, dimension: Dimension, value: Derived<String>) {
        match dimension {
            Dimension::Sentiment => self.sentiment = value,
            Dimension::Color => self.color = value,
            Dimension::Objects => self.objects = value,
            Dimension::Timestamp => self.timestamp = value,
        }
    }
}

fn missing_timestamp() -> Derived<String> {
    Derived::Nothing
}

/// `""` / `"None"` / text convention for tag dimensions
mod tag_text {
    use super::{Derived, NOTHING_MARKER};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Derived<String>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Derived::Pending => serializer.serialize_str(""),
            Derived::Nothing => serializer.serialize_str(NOTHING_MARKER),
            Derived::Found(text) => serializer.serialize_str(text),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Derived<String>, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            None => Derived::Pending,
            Some(text) if text.is_empty() => Derived::Pending,
            Some(text) if text == NOTHING_MARKER => Derived::Nothing,
            Some(text) => Derived::Found(text),
        })
    }
}

/// `""` / absent / text convention for the capture timestamp
mod timestamp_text {
    use super::Derived;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Derived<String>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Derived::Pending => serializer.serialize_str(""),
            // Normally skipped; a null reads back as Nothing all the same
            Derived::Nothing => serializer.serialize_none(),
            Derived::Found(text) => serializer.serialize_str(text),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Derived<String>, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            None => Derived::Nothing,
            Some(text) if text.is_empty() => Derived::Pending,
            Some(text) => Derived::Found(text),
        })
    }
}

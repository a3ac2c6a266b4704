//! Per-dimension reuse decisions
//!
//! Enrichers are slow (model inference, full decodes), so a value already in
//! the manifest is reused whenever it is trustworthy. A dimension switched off
//! for the run is never touched: whatever the manifest held is carried forward.

use serde::{Deserialize, Serialize};

use crate::state::record::{Derived, Dimension, PhotoRecord};

/// Which enrichment dimensions a run attempts
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EnrichmentFlags {
    pub sentiment: bool,
    pub color: bool,
    pub objects: bool,
    pub timestamp: bool,
}

impl EnrichmentFlags {
    pub fn all() -> Self {
        Self {
            sentiment: true,
            color: true,
            objects: true,
            timestamp: true,
        }
    }

    pub fn is_enabled(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::Sentiment => self.sentiment,
            Dimension::Color => self.color,
            Dimension::Objects => self.objects,
            Dimension::Timestamp => self.timestamp,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = Dimension> + '_ {
        Dimension::ALL.into_iter().filter(|&dimension| self.is_enabled(dimension))
    }
}

/// What to do with one dimension of one photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPlan {
    /// Dimension disabled; keep the stored value verbatim
    Carry(Derived<String>),
    /// Dimension enabled and the stored value is trusted
    Reuse(Derived<String>),
    /// Call the enricher
    Compute,
}

/// Decide how `dimension` is resolved for a photo whose stored record is `existing`
pub fn plan_field(dimension: Dimension, enabled: bool, existing: Option<&PhotoRecord>) -> FieldPlan {
    let stored = existing.map(|record| record.field(dimension));

    if !enabled {
        return FieldPlan::Carry(stored.cloned().unwrap_or_default());
    }

    match stored {
        Some(value) if is_reusable(dimension, value) => FieldPlan::Reuse(value.clone()),
        _ => FieldPlan::Compute,
    }
}

/// Whether a stored value is good enough to skip the enricher
pub fn is_reusable(dimension: Dimension, value: &Derived<String>) -> bool {
    match (dimension, value) {
        // Older runs wrote these markers as text
        (Dimension::Timestamp, Derived::Found(text)) => {
            !matches!(text.trim().to_lowercase().as_str(), "" | "none" | "null")
        }
        (Dimension::Timestamp, _) => false,
        // A detector that saw nothing is not asked again
        (Dimension::Objects, Derived::Found(_) | Derived::Nothing) => true,
        (_, Derived::Found(_)) => true,
        _ => false,
    }
}

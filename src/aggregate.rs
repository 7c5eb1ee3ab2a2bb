//! Merging per-corpus annotation maps
//!
//! Maps are merged by document id. When the same document id comes from two
//! sources the later source's list replaces the earlier one in full; lists
//! are never combined. Each replacement is counted as a collision so a pass
//! summary can report it.

use crate::annotation::AnnotationMap;

/// Folds annotation maps together, last write wins
#[derive(Debug, Clone, Default)]
pub struct AnnotationAggregator {
    merged: AnnotationMap,
    sources: usize,
    collisions: usize,
}

impl AnnotationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge maps in order
    pub fn merge<I>(maps: I) -> Self
    where
        I: IntoIterator<Item = AnnotationMap>,
    {
        let mut aggregator = Self::new();
        for map in maps {
            aggregator.absorb(map);
        }
        aggregator
    }

    /// Fold in one more map, returning how many of its documents replaced
    /// an existing entry
    pub fn absorb(&mut self, map: AnnotationMap) -> usize {
        let mut replaced = 0;
        for (document, annotations) in map {
            if self.merged.insert_document(document, annotations).is_some() {
                replaced += 1;
            }
        }
        self.sources += 1;
        self.collisions += replaced;
        replaced
    }

    /// Number of maps absorbed so far
    pub fn sources(&self) -> usize {
        self.sources
    }

    /// Document ids that were overwritten by a later source
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn annotations(&self) -> &AnnotationMap {
        &self.merged
    }

    pub fn finish(self) -> AnnotationMap {
        self.merged
    }
}

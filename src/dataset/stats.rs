//! Corpus statistics over an annotation map

use crate::annotation::AnnotationMap;
use std::collections::HashSet;
use std::fmt;

/// Annotations bucketed by surface-form length in words (1, 2, 3, 4, 5+)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordHistogram([usize; 5]);

impl WordHistogram {
    fn record(&mut self, words: usize) {
        let bucket = words.clamp(1, 5) - 1;
        self.0[bucket] += 1;
    }

    /// Count for `words` words; 5 and above share the last bucket
    pub fn count(&self, words: usize) -> usize {
        self.0[words.clamp(1, 5) - 1]
    }

    pub fn buckets(&self) -> &[usize; 5] {
        &self.0
    }
}

/// Summary statistics for a dataset partition or a whole KB's dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusStatistics {
    pub documents: usize,
    pub annotations: usize,
    pub mean_per_document: f64,
    pub max_per_document: usize,
    pub min_per_document: usize,
    /// Only the first annotation at each start offset of a document is counted
    pub word_histogram: WordHistogram,
}

impl CorpusStatistics {
    pub fn compute(map: &AnnotationMap) -> Self {
        if map.is_empty() {
            return Self::default();
        }

        let mut stats = Self {
            min_per_document: usize::MAX,
            ..Default::default()
        };
        for (_, annotations) in map {
            stats.documents += 1;
            stats.annotations += annotations.len();
            stats.max_per_document = stats.max_per_document.max(annotations.len());
            stats.min_per_document = stats.min_per_document.min(annotations.len());

            let mut starts = HashSet::new();
            for annotation in annotations {
                if starts.insert(annotation.start) {
                    stats.word_histogram.record(annotation.word_count());
                }
            }
        }
        stats.mean_per_document = stats.annotations as f64 / stats.documents as f64;
        stats
    }

    /// Share of all annotations falling into a histogram bucket, in percent
    pub fn word_share(&self, words: usize) -> f64 {
        if self.annotations == 0 {
            return 0.0;
        }
        self.word_histogram.count(words) as f64 / self.annotations as f64 * 100.0
    }
}

impl fmt::Display for CorpusStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total number of documents: {}", self.documents)?;
        writeln!(f, "Total number of annotations: {}", self.annotations)?;
        writeln!(f, "Annotations per document: {:.3}", self.mean_per_document)?;
        writeln!(f, "Max number of annotations per document: {}", self.max_per_document)?;
        writeln!(f, "Min number of annotations per document: {}", self.min_per_document)?;
        for words in 1..=5 {
            let label = match words {
                1 => "1 word".to_string(),
                5 => "5 or more words".to_string(),
                n => format!("{} words", n),
            };
            write!(
                f,
                "{} annotations ({:.2} %) with {}",
                self.word_histogram.count(words),
                self.word_share(words),
                label
            )?;
            if words < 5 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

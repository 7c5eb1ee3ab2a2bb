//! PGR (phenotype-gene relation) corpus
//!
//! `train.tsv` and `test.tsv` carry one relation per row. The first row of
//! each file is a header and is skipped by position. HPO ids are written
//! with an underscore (`HP_0001250`) and are rewritten to `HP:0001250`.

use super::{open_corpus_file, parse_offset, CorpusExtractor, ExtractResult, Extraction};
use crate::annotation::IdStyle;
use crate::kb::KbIndex;
use csv::ReaderBuilder;
use std::path::Path;

const DOCUMENT_COLUMN: usize = 0;
const TEXT_COLUMN: usize = 3;
const CONCEPT_COLUMN: usize = 5;
const START_COLUMN: usize = 8;
const END_COLUMN: usize = 9;

/// PGR relation corpus
#[derive(Debug, Clone)]
pub struct PgrCorpus {
    files: Vec<String>,
    style: IdStyle,
}

impl Default for PgrCorpus {
    fn default() -> Self {
        Self::new()
    }
}

impl PgrCorpus {
    pub const FILES: [&'static str; 2] = ["train.tsv", "test.tsv"];

    pub fn new() -> Self {
        Self {
            files: Self::FILES.iter().map(|s| s.to_string()).collect(),
            style: IdStyle::Native,
        }
    }

    /// Rebuild an HPO id from the corpus's underscore form
    pub fn concept_id(raw: &str) -> String {
        raw.trim().replace('_', ":")
    }
}

impl CorpusExtractor for PgrCorpus {
    fn name(&self) -> &str {
        "pgr"
    }

    fn extract(&self, kb: &KbIndex, source: &Path) -> ExtractResult<Extraction> {
        let mut extraction = Extraction::default();

        for file_name in &self.files {
            let path = source.join(file_name);
            let file = open_corpus_file(self.name(), &path)?;
            let mut reader = ReaderBuilder::new()
                .delimiter(b'\t')
                .has_headers(false)
                .flexible(true)
                .from_reader(file);

            for record in reader.records().skip(1) {
                let record = match record {
                    Ok(record) => record,
                    Err(e) if e.is_io_error() => return Err(e.into()),
                    Err(_) => {
                        extraction.stats.malformed += 1;
                        continue;
                    }
                };
                extraction.stats.records += 1;

                if record.len() <= END_COLUMN {
                    extraction.stats.malformed += 1;
                    continue;
                }
                let (Some(start), Some(end)) = (
                    parse_offset(&record[START_COLUMN]),
                    parse_offset(&record[END_COLUMN]),
                ) else {
                    extraction.stats.malformed += 1;
                    continue;
                };

                let concept = Self::concept_id(&record[CONCEPT_COLUMN]);
                match super::resolve_mention(kb, self.style, &record[TEXT_COLUMN], start, end, &concept) {
                    Some(annotation) => {
                        extraction.stats.emitted += 1;
                        extraction.annotations.push(&record[DOCUMENT_COLUMN], annotation);
                    }
                    None => extraction.stats.unmapped += 1,
                }
            }
            tracing::debug!(corpus = self.name(), file = %path.display(), "read corpus file");
        }

        Ok(extraction)
    }
}

//! Tab-separated mention corpora: NCBI Disease and BC5CDR
//!
//! Both corpora interleave title/abstract lines with six-field mention rows
//! `document, start, end, text, entity type, MeSH id`. Only six-field rows
//! are considered; everything else is skipped without side effects.

use super::{
    open_corpus_file, parse_offset, resolve_mention, tab_fields, CorpusExtractor, CorpusLines,
    ExtractError, ExtractResult, Extraction,
};
use crate::annotation::IdStyle;
use crate::kb::{strip_mesh_prefix, KbIndex, KnowledgeBase};
use std::io::BufReader;
use std::path::Path;

const MENTION_FIELDS: usize = 6;

/// One mention row
struct MentionRow<'a> {
    document: &'a str,
    start: u64,
    end: u64,
    text: &'a str,
    entity_type: &'a str,
    concept: &'a str,
}

/// Walk the six-field rows of each file in order
fn for_each_row<F>(corpus: &str, dir: &Path, files: &[&str], extraction: &mut Extraction, mut f: F) -> ExtractResult<()>
where
    F: FnMut(&MentionRow<'_>, &mut Extraction),
{
    for file_name in files {
        let path = dir.join(file_name);
        let reader = BufReader::new(open_corpus_file(corpus, &path)?);

        for line in CorpusLines::new(reader) {
            let Some(line) = line? else {
                extraction.stats.malformed += 1;
                continue;
            };
            let fields = tab_fields(&line);
            if fields.len() != MENTION_FIELDS {
                continue;
            }
            extraction.stats.records += 1;

            let (Some(start), Some(end)) = (parse_offset(fields[1]), parse_offset(fields[2])) else {
                extraction.stats.malformed += 1;
                continue;
            };
            let row = MentionRow {
                document: fields[0],
                start,
                end,
                text: fields[3],
                entity_type: fields[4],
                concept: strip_mesh_prefix(fields[5].trim()),
            };
            f(&row, extraction);
        }
        tracing::debug!(corpus, file = %path.display(), "read corpus file");
    }
    Ok(())
}

/// NCBI Disease corpus, normalized against MEDIC
#[derive(Debug, Clone)]
pub struct NcbiDiseaseCorpus {
    files: Vec<String>,
    style: IdStyle,
}

impl Default for NcbiDiseaseCorpus {
    fn default() -> Self {
        Self::new()
    }
}

impl NcbiDiseaseCorpus {
    pub const FILES: [&'static str; 3] = [
        "NCBItrainset_corpus.txt",
        "NCBIdevelopset_corpus.txt",
        "NCBItestset_corpus.txt",
    ];

    pub fn new() -> Self {
        Self {
            files: Self::FILES.iter().map(|s| s.to_string()).collect(),
            style: IdStyle::Native,
        }
    }

    /// Read a different set of files from the corpus directory
    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }
}

impl CorpusExtractor for NcbiDiseaseCorpus {
    fn name(&self) -> &str {
        "ncbi_disease"
    }

    fn extract(&self, kb: &KbIndex, source: &Path) -> ExtractResult<Extraction> {
        let mut extraction = Extraction::default();
        let files: Vec<&str> = self.files.iter().map(String::as_str).collect();

        for_each_row(self.name(), source, &files, &mut extraction, |row, out| {
            match resolve_mention(kb, self.style, row.text, row.start, row.end, row.concept) {
                Some(annotation) => {
                    out.stats.emitted += 1;
                    out.annotations.push(row.document, annotation);
                }
                None => out.stats.unmapped += 1,
            }
        })?;

        Ok(extraction)
    }
}

/// BC5CDR chemical-disease corpus
///
/// Each KB only takes the rows of its own entity type: `Disease` rows for
/// MEDIC, `Chemical` rows for CTD chemicals.
#[derive(Debug, Clone)]
pub struct Bc5cdrCorpus {
    entity_type: &'static str,
    files: Vec<String>,
    style: IdStyle,
}

impl Bc5cdrCorpus {
    pub const FILES: [&'static str; 3] = [
        "CDR_TrainingSet.PubTator.txt",
        "CDR_DevelopmentSet.PubTator.txt",
        "CDR_TestSet.PubTator.txt",
    ];

    /// Build the extractor for the entity type matching `kb`
    pub fn for_kb(kb: KnowledgeBase) -> ExtractResult<Self> {
        let entity_type = match kb {
            KnowledgeBase::Medic => "Disease",
            KnowledgeBase::CtdChemicals => "Chemical",
            _ => {
                return Err(ExtractError::UnsupportedKb {
                    corpus: "bc5cdr".into(),
                    kb,
                })
            }
        };
        Ok(Self {
            entity_type,
            files: Self::FILES.iter().map(|s| s.to_string()).collect(),
            style: IdStyle::MeshUri,
        })
    }

    pub fn entity_type(&self) -> &str {
        self.entity_type
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }
}

impl CorpusExtractor for Bc5cdrCorpus {
    fn name(&self) -> &str {
        "bc5cdr"
    }

    fn extract(&self, kb: &KbIndex, source: &Path) -> ExtractResult<Extraction> {
        let mut extraction = Extraction::default();
        let files: Vec<&str> = self.files.iter().map(String::as_str).collect();

        for_each_row(self.name(), source, &files, &mut extraction, |row, out| {
            if row.entity_type != self.entity_type {
                out.stats.skipped += 1;
                return;
            }
            match resolve_mention(kb, self.style, row.text, row.start, row.end, row.concept) {
                Some(annotation) => {
                    out.stats.emitted += 1;
                    out.annotations.push(row.document, annotation);
                }
                None => out.stats.unmapped += 1,
            }
        })?;

        Ok(extraction)
    }
}

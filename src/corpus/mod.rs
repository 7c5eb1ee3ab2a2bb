//! Corpus annotation extractors
//!
//! Every corpus format has its own extractor; all of them produce the same
//! [`AnnotationMap`] and all of them apply the single-ancestor filter before
//! an annotation is emitted. A mention whose concept has no single direct
//! ancestor in the [`KbIndex`] is dropped and counted, never emitted with a
//! placeholder.
//!
//! # Extractor kinds
//!
//! - [`CorpusExtractor`]: reads a whole corpus from its source path
//! - [`DocumentExtractor`]: turns one raw document into annotations, so the
//!   corpus can be fanned out by the [`ParallelDriver`](crate::driver::ParallelDriver)
//!
//! # Formats
//!
//! | Extractor | Corpus | Source |
//! |-----------|--------|--------|
//! | [`NcbiDiseaseCorpus`] | NCBI Disease | directory of tab-separated files |
//! | [`Bc5cdrCorpus`] | BC5CDR | directory of PubTator files |
//! | [`CraftCorpus`] | CRAFT | directory of knowtator XML files |
//! | [`MedMentionsCorpus`] | MedMentions | one PubTator file, streamed |
//! | [`PgrCorpus`] | PGR | directory with `train.tsv` and `test.tsv` |
//! | [`PbdmsCorpus`] | PubMed DS | one JSON document per line |

mod craft;
mod medmentions;
mod pbdms;
mod pgr;
mod pubtator;

pub use craft::{craft_documents, CraftCorpus, CRAFT_SUFFIX};
pub use medmentions::MedMentionsCorpus;
pub use pbdms::{pbdms_documents, PbdmsCorpus};
pub use pgr::PgrCorpus;
pub use pubtator::{Bc5cdrCorpus, NcbiDiseaseCorpus};

use crate::annotation::{Annotation, AnnotationMap, IdStyle};
use crate::kb::{KbIndex, KnowledgeBase};
use std::fs::File;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading a corpus
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Corpus source not found for {corpus}: {}", path.display())]
    SourceNotFound { corpus: String, path: PathBuf },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Document {document}: class mention refers to missing mention {mention}")]
    ReferentialIntegrity { document: String, mention: String },

    #[error("Corpus {corpus} has no annotations for knowledge base {kb}")]
    UnsupportedKb { corpus: String, kb: KnowledgeBase },

    #[error("Extraction worker failed: {0}")]
    Worker(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ExtractError {
    /// Whether the error only invalidates the record it was raised for
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedRecord(_) | Self::Json(_))
    }
}

/// Result type for extraction
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Counters for one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Documents handed to a document extractor
    pub documents: usize,
    /// Mention rows or elements examined
    pub records: usize,
    /// Records skipped for a wrong field count or unparsable value
    pub malformed: usize,
    /// Records filtered out by the format's rules (other entity type, ...)
    pub skipped: usize,
    /// Mentions whose concept has no single direct ancestor
    pub unmapped: usize,
    /// Mentions whose foreign id has no translation in the KB
    pub untranslated: usize,
    pub emitted: usize,
}

impl ExtractionStats {
    pub fn absorb(&mut self, other: &ExtractionStats) {
        self.documents += other.documents;
        self.records += other.records;
        self.malformed += other.malformed;
        self.skipped += other.skipped;
        self.unmapped += other.unmapped;
        self.untranslated += other.untranslated;
        self.emitted += other.emitted;
    }
}

/// A document excluded from the output because its extraction failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    /// Where the document came from (file name, `path:line`)
    pub origin: String,
    pub reason: String,
}

/// The output of one extraction pass
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub annotations: AnnotationMap,
    pub stats: ExtractionStats,
    pub failures: Vec<DocumentFailure>,
}

impl Extraction {
    /// Emit the end-of-pass summary
    pub fn log_summary(&self, kb: KnowledgeBase, corpus: &str) {
        tracing::info!(
            kb = %kb,
            corpus,
            documents_out = self.annotations.len(),
            annotations_out = self.annotations.annotation_count(),
            records = self.stats.records,
            malformed = self.stats.malformed,
            skipped = self.stats.skipped,
            unmapped = self.stats.unmapped,
            untranslated = self.stats.untranslated,
            failed_documents = self.failures.len(),
            "extraction pass complete"
        );
        for failure in &self.failures {
            tracing::warn!(kb = %kb, corpus, origin = %failure.origin, reason = %failure.reason, "document failed");
        }
    }

    /// Fold one document's result in, keeping failures out of the map
    pub(crate) fn absorb_document(
        &mut self,
        origin: String,
        result: ExtractResult<DocumentAnnotations>,
    ) {
        match result {
            Ok(doc) => {
                self.stats.absorb(&doc.stats);
                self.annotations.insert_document(doc.document, doc.annotations);
            }
            Err(e) if e.is_malformed() => {
                self.stats.documents += 1;
                self.stats.malformed += 1;
                tracing::debug!(origin = %origin, error = %e, "skipping malformed document");
            }
            Err(e) => {
                self.stats.documents += 1;
                self.failures.push(DocumentFailure {
                    origin,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// One raw document awaiting extraction
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Where the document came from; some formats derive the document id from it
    pub origin: String,
    pub content: String,
}

impl RawDocument {
    pub fn new(origin: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            content: content.into(),
        }
    }
}

/// Annotations extracted from a single document
#[derive(Debug, Clone)]
pub struct DocumentAnnotations {
    pub document: String,
    /// In source order; may be empty, in which case the document is left out
    pub annotations: Vec<Annotation>,
    pub stats: ExtractionStats,
}

/// Reads a whole corpus into an annotation map
pub trait CorpusExtractor: Send + Sync {
    /// Corpus name used in logs and errors
    fn name(&self) -> &str;

    /// Extract every annotation in the corpus found at `source`
    fn extract(&self, kb: &KbIndex, source: &Path) -> ExtractResult<Extraction>;
}

/// Extracts annotations from one self-contained document
///
/// Implementations must not keep mutable state: the driver calls them from
/// several workers at once with a shared index.
pub trait DocumentExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract_document(
        &self,
        kb: &KbIndex,
        raw: &RawDocument,
    ) -> ExtractResult<DocumentAnnotations>;
}

/// Run a document extractor over a stream of documents on the calling thread
///
/// Failure isolation matches the parallel driver: a failing document is
/// recorded and the pass continues.
pub fn extract_sequential<I>(extractor: &dyn DocumentExtractor, kb: &KbIndex, documents: I) -> Extraction
where
    I: IntoIterator<Item = ExtractResult<RawDocument>>,
{
    let mut extraction = Extraction::default();
    for (sequence, raw) in documents.into_iter().enumerate() {
        match raw {
            Ok(raw) => {
                let result = extractor.extract_document(kb, &raw);
                extraction.absorb_document(raw.origin, result);
            }
            Err(e) => extraction.absorb_document(format!("#{}", sequence), Err(e)),
        }
    }
    extraction
}

/// Build the annotation for a mention if its concept has a single ancestor
///
/// `concept_id` must be in the index's native form.
pub(crate) fn resolve_mention(
    kb: &KbIndex,
    style: IdStyle,
    text: &str,
    start: u64,
    end: u64,
    concept_id: &str,
) -> Option<Annotation> {
    let parent = kb.parent_of(concept_id)?;
    Some(Annotation::new(
        text,
        start,
        end,
        style.render(concept_id),
        style.render(parent),
    ))
}

/// Open a corpus file, reporting a missing file with the corpus it belongs to
pub(crate) fn open_corpus_file(corpus: &str, path: &Path) -> ExtractResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ExtractError::SourceNotFound {
            corpus: corpus.to_string(),
            path: path.to_path_buf(),
        },
        _ => ExtractError::Io(e),
    })
}

/// Split a tab-separated line, dropping the line terminator
pub(crate) fn tab_fields(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\n', '\r']).split('\t').collect()
}

/// Parse a format-native offset
pub(crate) fn parse_offset(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

/// Line reader that tolerates lines which are not valid UTF-8
///
/// Yields `Ok(None)` for an undecodable line so the caller can count it as
/// malformed and keep going. Only reader failures surface as `Err`.
pub(crate) struct CorpusLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> CorpusLines<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for CorpusLines<R> {
    type Item = io::Result<Option<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(std::str::from_utf8(&self.buf).ok().map(str::to_owned)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

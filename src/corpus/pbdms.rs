//! PubMed DS (PBDMS) document splits
//!
//! A split file holds one JSON document per line:
//!
//! ```text
//! {"_id": "1234", "mentions": [{"mention": "asthma", "start_offset": 0,
//!   "end_offset": 6, "mesh_id": "D001249"}]}
//! ```
//!
//! Lines are independent, so the split is read lazily and each line is
//! handed to [`PbdmsCorpus`] as its own document. Emitted ids use the
//! `MESH:` CURIE form.

use super::{
    extract_sequential, open_corpus_file, CorpusExtractor, CorpusLines, DocumentAnnotations,
    DocumentExtractor, ExtractError, ExtractResult, Extraction, ExtractionStats, RawDocument,
};
use crate::annotation::IdStyle;
use crate::kb::{strip_mesh_prefix, KbIndex};
use serde::Deserialize;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct PbdmsDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    mentions: Vec<PbdmsMention>,
}

#[derive(Debug, Deserialize)]
struct PbdmsMention {
    mention: String,
    start_offset: u64,
    end_offset: u64,
    mesh_id: String,
}

/// PBDMS extractor for one split file
#[derive(Debug, Clone)]
pub struct PbdmsCorpus {
    style: IdStyle,
}

impl Default for PbdmsCorpus {
    fn default() -> Self {
        Self::new()
    }
}

impl PbdmsCorpus {
    pub fn new() -> Self {
        Self {
            style: IdStyle::MeshCurie,
        }
    }

    /// File name of split `n` under the corpus directory
    pub fn split_file(split: u32) -> String {
        format!("split_{}.txt", split)
    }
}

impl DocumentExtractor for PbdmsCorpus {
    fn name(&self) -> &str {
        "pbdms"
    }

    fn extract_document(
        &self,
        kb: &KbIndex,
        raw: &RawDocument,
    ) -> ExtractResult<DocumentAnnotations> {
        let doc: PbdmsDocument = serde_json::from_str(raw.content.trim())?;
        let mut stats = ExtractionStats {
            documents: 1,
            ..Default::default()
        };
        let mut annotations = Vec::with_capacity(doc.mentions.len());

        for mention in &doc.mentions {
            stats.records += 1;
            let concept = strip_mesh_prefix(mention.mesh_id.trim());
            match super::resolve_mention(
                kb,
                self.style,
                &mention.mention,
                mention.start_offset,
                mention.end_offset,
                concept,
            ) {
                Some(annotation) => {
                    stats.emitted += 1;
                    annotations.push(annotation);
                }
                None => stats.unmapped += 1,
            }
        }

        Ok(DocumentAnnotations {
            document: doc.id,
            annotations,
            stats,
        })
    }
}

impl CorpusExtractor for PbdmsCorpus {
    fn name(&self) -> &str {
        "pbdms"
    }

    /// `source` is the split file itself
    fn extract(&self, kb: &KbIndex, source: &Path) -> ExtractResult<Extraction> {
        let documents = pbdms_documents(source)?;
        Ok(extract_sequential(self, kb, documents))
    }
}

/// Read a split file lazily, one non-blank line per document
///
/// Each document's origin is `path:line` (1-based).
pub fn pbdms_documents(
    path: &Path,
) -> ExtractResult<impl Iterator<Item = ExtractResult<RawDocument>>> {
    let reader = BufReader::new(open_corpus_file("pbdms", path)?);
    let display = path.display().to_string();

    Ok(CorpusLines::new(reader)
        .enumerate()
        .filter_map(move |(n, line)| match line {
            Ok(Some(line)) if line.trim().is_empty() => None,
            Ok(Some(line)) => Some(Ok(RawDocument::new(format!("{}:{}", display, n + 1), line))),
            Ok(None) => Some(Err(ExtractError::MalformedRecord(format!(
                "{}:{}: not valid UTF-8",
                display,
                n + 1
            )))),
            Err(e) => Some(Err(ExtractError::Io(e))),
        }))
}

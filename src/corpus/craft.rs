//! CRAFT knowtator XML corpus
//!
//! Each document is one `<id>.txt.knowtator.xml` file holding two tables:
//!
//! ```text
//! <annotation>
//!   <mention id="CRAFT_CHEBI_Instance_1"/>
//!   <span start="10" end="17"/>
//!   <spannedText>glucose</spannedText>
//! </annotation>
//! <classMention id="CRAFT_CHEBI_Instance_1">
//!   <mentionClass id="CHEBI:17234">glucose</mentionClass>
//! </classMention>
//! ```
//!
//! All mention spans are collected first, then class mentions are joined
//! against them. A class mention pointing at a mention id that does not exist
//! fails the whole document.

use super::{
    extract_sequential, CorpusExtractor, DocumentAnnotations, DocumentExtractor, ExtractError,
    ExtractResult, Extraction, ExtractionStats, RawDocument,
};
use crate::annotation::IdStyle;
use crate::kb::KbIndex;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name suffix of a knowtator document
pub const CRAFT_SUFFIX: &str = ".txt.knowtator.xml";

/// Span and text of one `<annotation>` element
#[derive(Debug, Default)]
struct MentionSpan {
    text: Option<String>,
    start: Option<u64>,
    end: Option<u64>,
}

/// Which element's text is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Outside,
    Annotation,
    SpannedText,
    ClassMention,
}

/// CRAFT concept annotations (ChEBI or GO biological process)
#[derive(Debug, Clone, Default)]
pub struct CraftCorpus {
    style: IdStyle,
}

impl CraftCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document id for a knowtator file name
    pub fn document_id(origin: &str) -> &str {
        let file_name = Path::new(origin)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(origin);
        file_name
            .strip_suffix(CRAFT_SUFFIX)
            .or_else(|| file_name.strip_suffix(".xml"))
            .unwrap_or(file_name)
    }
}

impl DocumentExtractor for CraftCorpus {
    fn name(&self) -> &str {
        "craft"
    }

    fn extract_document(
        &self,
        kb: &KbIndex,
        raw: &RawDocument,
    ) -> ExtractResult<DocumentAnnotations> {
        let document = Self::document_id(&raw.origin).to_string();
        let (mentions, class_mentions) = parse_knowtator(&raw.content)?;
        let mut stats = ExtractionStats {
            documents: 1,
            ..Default::default()
        };
        let mut annotations = Vec::new();

        for (mention_id, concept_id) in class_mentions {
            stats.records += 1;
            let span = mentions.get(&mention_id).ok_or_else(|| {
                ExtractError::ReferentialIntegrity {
                    document: document.clone(),
                    mention: mention_id.clone(),
                }
            })?;
            let (Some(text), Some(start), Some(end)) = (span.text.as_deref(), span.start, span.end)
            else {
                stats.malformed += 1;
                continue;
            };

            match super::resolve_mention(kb, self.style, text, start, end, &concept_id) {
                Some(annotation) => {
                    stats.emitted += 1;
                    annotations.push(annotation);
                }
                None => stats.unmapped += 1,
            }
        }

        Ok(DocumentAnnotations {
            document,
            annotations,
            stats,
        })
    }
}

impl CorpusExtractor for CraftCorpus {
    fn name(&self) -> &str {
        "craft"
    }

    fn extract(&self, kb: &KbIndex, source: &Path) -> ExtractResult<Extraction> {
        let paths = craft_files(CorpusExtractor::name(self), source)?;
        let documents = paths.into_iter().map(read_document);
        Ok(extract_sequential(self, kb, documents))
    }
}

/// Knowtator files in a corpus directory, in file name order
fn craft_files(corpus: &str, dir: &Path) -> ExtractResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ExtractError::SourceNotFound {
            corpus: corpus.to_string(),
            path: dir.to_path_buf(),
        });
    }
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| ExtractError::Io(e.into()))?;
        let is_xml = entry.path().extension().map(|ext| ext == "xml").unwrap_or(false);
        if entry.file_type().is_file() && is_xml {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

fn read_document(path: PathBuf) -> ExtractResult<RawDocument> {
    let content = fs::read_to_string(&path)?;
    let origin = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(RawDocument::new(origin, content))
}

/// Read the documents of a CRAFT directory lazily, one file per item
pub fn craft_documents(dir: &Path) -> ExtractResult<impl Iterator<Item = ExtractResult<RawDocument>>> {
    Ok(craft_files("craft", dir)?.into_iter().map(read_document))
}

fn attribute(element: &BytesStart<'_>, name: &str) -> ExtractResult<Option<String>> {
    match element
        .try_get_attribute(name)
        .map_err(quick_xml::Error::from)?
    {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn offset_attribute(element: &BytesStart<'_>, name: &str) -> ExtractResult<Option<u64>> {
    Ok(attribute(element, name)?.and_then(|v| super::parse_offset(&v)))
}

/// Mention table and the ordered `(mention id, concept id)` class references
type Knowtator = (HashMap<String, MentionSpan>, Vec<(String, String)>);

fn parse_knowtator(xml: &str) -> ExtractResult<Knowtator> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut mentions: HashMap<String, MentionSpan> = HashMap::new();
    let mut class_mentions = Vec::new();

    let mut scope = Scope::Outside;
    let mut mention_id: Option<String> = None;
    let mut span = MentionSpan::default();
    let mut class_id: Option<String> = None;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let opens = matches!(event, Event::Start(_));
                match (scope, e.name().as_ref()) {
                    (Scope::Outside, b"annotation") if opens => {
                        scope = Scope::Annotation;
                        mention_id = None;
                        span = MentionSpan::default();
                    }
                    (Scope::Annotation, b"mention") => mention_id = attribute(e, "id")?,
                    (Scope::Annotation, b"span") if span.start.is_none() => {
                        span.start = offset_attribute(e, "start")?;
                        span.end = offset_attribute(e, "end")?;
                    }
                    (Scope::Annotation, b"spannedText") if opens => scope = Scope::SpannedText,
                    (Scope::Outside, b"classMention") if opens => {
                        scope = Scope::ClassMention;
                        class_id = attribute(e, "id")?;
                    }
                    (Scope::ClassMention, b"mentionClass") => {
                        if let (Some(mention), Some(concept)) = (class_id.clone(), attribute(e, "id")?) {
                            class_mentions.push((mention, concept));
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) if scope == Scope::SpannedText => {
                span.text
                    .get_or_insert_with(String::new)
                    .push_str(&t.unescape()?);
            }
            Event::End(e) => match (scope, e.name().as_ref()) {
                (Scope::SpannedText, b"spannedText") => scope = Scope::Annotation,
                (Scope::Annotation, b"annotation") => {
                    scope = Scope::Outside;
                    if let Some(id) = mention_id.take() {
                        mentions.insert(id, std::mem::take(&mut span));
                    }
                }
                (Scope::ClassMention, b"classMention") => {
                    scope = Scope::Outside;
                    class_id = None;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((mentions, class_mentions))
}

//! Annotation records and the per-document annotation map

use crate::kb::strip_mesh_prefix;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Base of the MeSH descriptor URIs used by the BC5CDR rendering
pub const MESH_URI_BASE: &str = "https://id.nlm.nih.gov/mesh/";

/// A text span linked to a KB concept and that concept's single direct ancestor
///
/// Offsets are native to the corpus format (character or token positions)
/// and are not comparable across corpora. Serializes as a five-element array
/// `[text, start, end, concept_id, ancestor_id]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AnnotationRecord", into = "AnnotationRecord")]
pub struct Annotation {
    pub text: String,
    pub start: u64,
    pub end: u64,
    pub concept_id: String,
    pub ancestor_id: String,
}

#[derive(Serialize, Deserialize)]
struct AnnotationRecord(String, u64, u64, String, String);

impl From<AnnotationRecord> for Annotation {
    fn from(r: AnnotationRecord) -> Self {
        Self {
            text: r.0,
            start: r.1,
            end: r.2,
            concept_id: r.3,
            ancestor_id: r.4,
        }
    }
}

impl From<Annotation> for AnnotationRecord {
    fn from(a: Annotation) -> Self {
        Self(a.text, a.start, a.end, a.concept_id, a.ancestor_id)
    }
}

impl Annotation {
    pub fn new(
        text: impl Into<String>,
        start: u64,
        end: u64,
        concept_id: impl Into<String>,
        ancestor_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            concept_id: concept_id.into(),
            ancestor_id: ancestor_id.into(),
        }
    }

    /// Number of whitespace-separated words in the surface form
    pub fn word_count(&self) -> usize {
        self.text.split(' ').count()
    }
}

/// How emitted concept and ancestor ids are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdStyle {
    /// As stored in the knowledge base index
    #[default]
    Native,
    /// `MESH:D000001`
    MeshCurie,
    /// `https://id.nlm.nih.gov/mesh/D000001`
    MeshUri,
}

impl IdStyle {
    pub fn render(&self, id: &str) -> String {
        match self {
            Self::Native => id.to_string(),
            Self::MeshCurie => format!("MESH:{}", strip_mesh_prefix(id)),
            Self::MeshUri => format!("{}{}", MESH_URI_BASE, strip_mesh_prefix(id)),
        }
    }

    /// Undo any rendering, giving the id as stored in the index
    pub fn native(id: &str) -> &str {
        strip_mesh_prefix(id.strip_prefix(MESH_URI_BASE).unwrap_or(id))
    }
}

/// Annotations grouped by document id
///
/// A document never appears with an empty annotation list. Iteration is in
/// document id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationMap(BTreeMap<String, Vec<Annotation>>);

impl AnnotationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one annotation to a document, creating the document if needed
    pub fn push(&mut self, document: impl Into<String>, annotation: Annotation) {
        self.0.entry(document.into()).or_default().push(annotation);
    }

    /// Set a document's annotation list, replacing any previous list in full
    ///
    /// An empty list is ignored. Returns the replaced list, if any.
    pub fn insert_document(
        &mut self,
        document: impl Into<String>,
        annotations: Vec<Annotation>,
    ) -> Option<Vec<Annotation>> {
        if annotations.is_empty() {
            return None;
        }
        self.0.insert(document.into(), annotations)
    }

    pub fn get(&self, document: &str) -> Option<&[Annotation]> {
        self.0.get(document).map(Vec::as_slice)
    }

    pub fn contains(&self, document: &str) -> bool {
        self.0.contains_key(document)
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of annotations across documents
    pub fn annotation_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn document_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<Annotation>> {
        self.0.iter()
    }

    /// Remove and return a document's annotations
    pub fn remove(&mut self, document: &str) -> Option<Vec<Annotation>> {
        self.0.remove(document)
    }
}

impl IntoIterator for AnnotationMap {
    type Item = (String, Vec<Annotation>);
    type IntoIter = btree_map::IntoIter<String, Vec<Annotation>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AnnotationMap {
    type Item = (&'a String, &'a Vec<Annotation>);
    type IntoIter = btree_map::Iter<'a, String, Vec<Annotation>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, Vec<Annotation>)> for AnnotationMap {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Annotation>)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (document, annotations) in iter {
            map.insert_document(document, annotations);
        }
        map
    }
}

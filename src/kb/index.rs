//! KbIndex: the lookup tables built from one knowledge base

use super::{obo, thesaurus, KnowledgeBase, SourceForm};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Vocabulary prefix carried by MeSH identifiers in source files
pub const MESH_PREFIX: &str = "MESH:";

/// Errors that can occur while loading a knowledge base
#[derive(Debug, Error)]
pub enum KbError {
    #[error("Knowledge base source not found for {kb}: {}", path.display())]
    SourceNotFound { kb: KnowledgeBase, path: PathBuf },

    #[error("No node in {} carries the fields required by {kb}", path.display())]
    MalformedSource { kb: KnowledgeBase, path: PathBuf },

    #[error("Unknown knowledge base: {0}")]
    UnknownKnowledgeBase(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for knowledge base operations
pub type KbResult<T> = Result<T, KbError>;

/// Number of direct ancestors declared for a concept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ancestry {
    /// No parent edge (ontology root)
    Root,
    /// Exactly one parent edge
    Single,
    /// Two or more parent edges
    Multiple,
}

/// Counters reported by a single load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Stanzas or data rows read
    pub nodes_seen: usize,
    /// Nodes that passed the KB-specific admission rule
    pub nodes_admitted: usize,
    /// Nodes carrying an id and a name, admitted or not
    pub nodes_with_required_fields: usize,
    pub single_ancestor: usize,
    pub multiple_ancestors: usize,
    pub roots: usize,
    pub synonyms: usize,
    pub external_refs: usize,
    /// Rows too short to hold the required columns
    pub malformed_rows: usize,
}

impl LoadStats {
    pub(crate) fn record_ancestry(&mut self, ancestry: Ancestry) {
        match ancestry {
            Ancestry::Root => self.roots += 1,
            Ancestry::Single => self.single_ancestor += 1,
            Ancestry::Multiple => self.multiple_ancestors += 1,
        }
    }
}

/// Lookup tables for one knowledge base
///
/// The index is owned by whoever loaded it and is read-only once extraction
/// starts; workers share it through an `Arc`. Loading the same source twice
/// into one instance accumulates into the existing tables.
#[derive(Debug, Clone)]
pub struct KbIndex {
    kb: KnowledgeBase,
    name_to_id: HashMap<String, String>,
    synonym_to_id: HashMap<String, String>,
    /// Present only for concepts with exactly one direct ancestor
    child_to_parent: HashMap<String, String>,
    /// Foreign vocabulary id (UMLS CUI) to concept id
    external_to_id: HashMap<String, String>,
}

impl KbIndex {
    /// Create an empty index for the given knowledge base
    pub fn new(kb: KnowledgeBase) -> Self {
        Self {
            kb,
            name_to_id: HashMap::new(),
            synonym_to_id: HashMap::new(),
            child_to_parent: HashMap::new(),
            external_to_id: HashMap::new(),
        }
    }

    /// Load a knowledge base source file into this index
    ///
    /// Fails with [`KbError::MalformedSource`] when no node carries the
    /// fields the KB needs; the index is then left as it was, which callers
    /// treat as an empty knowledge base.
    pub fn load(&mut self, path: impl AsRef<Path>) -> KbResult<LoadStats> {
        let path = path.as_ref();
        let stats = match self.kb.source_form() {
            SourceForm::Ontology => obo::load_obo(self, path)?,
            SourceForm::Thesaurus => thesaurus::load_thesaurus(self, path)?,
        };

        if stats.nodes_with_required_fields == 0 {
            return Err(KbError::MalformedSource {
                kb: self.kb,
                path: path.to_path_buf(),
            });
        }

        tracing::info!(
            kb = %self.kb,
            nodes = stats.nodes_seen,
            admitted = stats.nodes_admitted,
            single_ancestor = stats.single_ancestor,
            multiple_ancestors = stats.multiple_ancestors,
            roots = stats.roots,
            synonyms = stats.synonyms,
            external_refs = stats.external_refs,
            malformed_rows = stats.malformed_rows,
            "knowledge base loaded"
        );
        Ok(stats)
    }

    pub fn kb(&self) -> KnowledgeBase {
        self.kb
    }

    /// Direct ancestor of a concept, if it has exactly one
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.child_to_parent.get(id).map(String::as_str)
    }

    pub fn has_single_ancestor(&self, id: &str) -> bool {
        self.child_to_parent.contains_key(id)
    }

    /// Translate a foreign vocabulary id into this KB's concept id
    pub fn translate_external(&self, external_id: &str) -> Option<&str> {
        self.external_to_id.get(external_id).map(String::as_str)
    }

    pub fn id_for_name(&self, name: &str) -> Option<&str> {
        self.name_to_id.get(name).map(String::as_str)
    }

    pub fn id_for_synonym(&self, synonym: &str) -> Option<&str> {
        self.synonym_to_id.get(synonym).map(String::as_str)
    }

    /// Canonical names known to the index
    pub fn names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.name_to_id.iter().map(|(n, id)| (n.as_str(), id.as_str()))
    }

    pub fn child_to_parent(&self) -> &HashMap<String, String> {
        &self.child_to_parent
    }

    pub fn name_count(&self) -> usize {
        self.name_to_id.len()
    }

    pub fn synonym_count(&self) -> usize {
        self.synonym_to_id.len()
    }

    pub fn external_count(&self) -> usize {
        self.external_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty() && self.child_to_parent.is_empty()
    }

    // === Population (used by the loaders) ===

    pub(crate) fn insert_name(&mut self, name: impl Into<String>, id: impl Into<String>) {
        self.name_to_id.insert(name.into(), id.into());
    }

    pub(crate) fn insert_synonym(&mut self, synonym: impl Into<String>, id: impl Into<String>) {
        self.synonym_to_id.insert(synonym.into(), id.into());
    }

    pub(crate) fn insert_external(&mut self, external_id: impl Into<String>, id: impl Into<String>) {
        self.external_to_id.insert(external_id.into(), id.into());
    }

    /// Record the parent edges declared for a concept
    ///
    /// Only a single declared parent populates `child_to_parent`.
    pub(crate) fn add_ancestors<S: AsRef<str>>(&mut self, id: &str, parents: &[S]) -> Ancestry {
        match parents {
            [] => Ancestry::Root,
            [parent] => {
                self.child_to_parent
                    .insert(id.to_string(), parent.as_ref().to_string());
                Ancestry::Single
            }
            _ => Ancestry::Multiple,
        }
    }
}

/// Strip the `MESH:` vocabulary prefix, if present
pub fn strip_mesh_prefix(id: &str) -> &str {
    id.strip_prefix(MESH_PREFIX).unwrap_or(id)
}

/// Open a KB source, reporting a missing file with the KB it belongs to
pub(super) fn open_source(kb: KnowledgeBase, path: &Path) -> KbResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => KbError::SourceNotFound {
            kb,
            path: path.to_path_buf(),
        },
        _ => KbError::Io(e),
    })
}

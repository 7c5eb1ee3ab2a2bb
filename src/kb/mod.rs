//! Knowledge base loading
//!
//! A knowledge base is read either from an OBO ontology file (HPO, MEDIC,
//! ChEBI, GO) or from a CTD tabular thesaurus (CTD chemicals, CTD anatomy)
//! into a [`KbIndex`]: four lookup tables keyed by name, synonym, child
//! concept and foreign-vocabulary id.
//!
//! # Example
//!
//! ```ignore
//! use evanil::kb::{KbIndex, KnowledgeBase};
//!
//! let mut index = KbIndex::new(KnowledgeBase::Hp);
//! let stats = index.load("retrieved_data/kb_files/hp.obo")?;
//! println!("{} concepts with a single ancestor", stats.single_ancestor);
//! ```

mod index;
mod obo;
mod thesaurus;

pub use index::{strip_mesh_prefix, Ancestry, KbError, KbIndex, KbResult, LoadStats};
pub use obo::{parse_terms, OboTerm};
pub use thesaurus::THESAURUS_HEADER_ROWS;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a knowledge base is distributed on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceForm {
    /// OBO flat-file ontology
    Ontology,
    /// CTD tab-separated thesaurus
    Thesaurus,
}

/// The knowledge bases the corpus is normalized against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeBase {
    /// Human Phenotype Ontology
    Hp,
    /// CTD MEDIC disease vocabulary
    Medic,
    /// ChEBI (lite)
    Chebi,
    /// Gene Ontology, biological process branch
    GoBp,
    /// CTD chemicals thesaurus
    CtdChemicals,
    /// CTD anatomy thesaurus
    CtdAnatomy,
}

impl KnowledgeBase {
    pub const ALL: [KnowledgeBase; 6] = [
        KnowledgeBase::Hp,
        KnowledgeBase::Medic,
        KnowledgeBase::Chebi,
        KnowledgeBase::GoBp,
        KnowledgeBase::CtdChemicals,
        KnowledgeBase::CtdAnatomy,
    ];

    /// Short name used on the command line and in output directories
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hp => "hp",
            Self::Medic => "medic",
            Self::Chebi => "chebi",
            Self::GoBp => "go_bp",
            Self::CtdChemicals => "ctd_chemicals",
            Self::CtdAnatomy => "ctd_anatomy",
        }
    }

    pub fn source_form(&self) -> SourceForm {
        match self {
            Self::CtdChemicals | Self::CtdAnatomy => SourceForm::Thesaurus,
            _ => SourceForm::Ontology,
        }
    }

    /// File name of the knowledge base under `kb_files/`
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Hp => "hp.obo",
            Self::Medic => "CTD_diseases.obo",
            Self::Chebi => "chebi_lite.obo",
            Self::GoBp => "go-basic.obo",
            Self::CtdChemicals => "CTD_chemicals.tsv",
            Self::CtdAnatomy => "CTD_anatomy.tsv",
        }
    }

    /// Whether concept ids are MeSH descriptors, stored without the `MESH:` prefix
    pub fn uses_mesh_ids(&self) -> bool {
        matches!(self, Self::Medic | Self::CtdChemicals | Self::CtdAnatomy)
    }

    /// Whether the large PubMed distant-supervision corpus feeds this KB
    pub fn has_pbdms(&self) -> bool {
        matches!(self, Self::Medic | Self::CtdChemicals | Self::CtdAnatomy)
    }
}

impl fmt::Display for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeBase {
    type Err = KbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kb| kb.as_str() == s)
            .ok_or_else(|| KbError::UnknownKnowledgeBase(s.to_string()))
    }
}

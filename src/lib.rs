//! EvaNIL: a dataset builder for NIL-entity ancestor linking
//!
//! Biomedical corpora annotate text spans with concepts from a knowledge
//! base. EvaNIL turns those annotations into a benchmark for the case where
//! a concept is missing from the KB: each kept annotation records the
//! concept together with its single direct ancestor, which a NIL-aware
//! linker should predict instead.
//!
//! # Core Concepts
//!
//! - **Knowledge base index** ([`KbIndex`]): name, synonym, ancestor and
//!   cross-reference tables built from an OBO ontology or a CTD thesaurus
//! - **Extractors** ([`corpus`]): one per corpus format, all emitting the
//!   same [`AnnotationMap`] and all applying the single-ancestor filter
//! - **Pipeline** ([`Pipeline`]): wires corpora to KBs, merges, partitions
//!   into train/dev/test and persists JSON
//!
//! # Example
//!
//! ```no_run
//! use evanil::{KnowledgeBase, Pipeline, PipelineConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(PipelineConfig::new())?;
//! for report in pipeline.build(KnowledgeBase::Chebi, None).await? {
//!     println!("{}", report);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod annotation;
pub mod baseline;
pub mod config;
pub mod corpus;
pub mod dataset;
pub mod driver;
pub mod kb;
pub mod pipeline;

pub use aggregate::AnnotationAggregator;
pub use annotation::{Annotation, AnnotationMap, IdStyle};
pub use baseline::{Baseline, BaselineError, BaselineReport};
pub use config::{BaselineConfig, ConfigError, DataLayout, PipelineConfig};
pub use corpus::{
    CorpusExtractor, DocumentExtractor, DocumentFailure, ExtractError, ExtractResult, Extraction,
    ExtractionStats, RawDocument,
};
pub use dataset::{CorpusStatistics, DatasetError, Partition, PartitionSummary, Subset};
pub use driver::ParallelDriver;
pub use kb::{KbError, KbIndex, KbResult, KnowledgeBase, LoadStats};
pub use pipeline::{BuildReport, CorpusSource, Pipeline, PipelineError, PipelineResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

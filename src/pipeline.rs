//! End-to-end dataset build for one knowledge base
//!
//! The pipeline loads a KB once, runs the corpora wired to it, merges their
//! annotation maps (later corpora win on document id collisions), partitions
//! the result and writes it out:
//!
//! | KB | corpora, in merge order |
//! |----|-------------------------|
//! | `hp` | PGR, MedMentions |
//! | `medic` | PBDMS split n; split 1 adds NCBI Disease, BC5CDR |
//! | `ctd_chemicals` | PBDMS split n; split 1 adds BC5CDR |
//! | `ctd_anatomy` | PBDMS split n |
//! | `chebi`, `go_bp` | CRAFT |
//!
//! PBDMS-backed KBs are built one split at a time, each split partitioned
//! and persisted under its own `split_<n>/` directory.

use crate::aggregate::AnnotationAggregator;
use crate::annotation::AnnotationMap;
use crate::baseline::BaselineError;
use crate::config::{ConfigError, DataLayout, PipelineConfig};
use crate::corpus::{
    craft_documents, pbdms_documents, Bc5cdrCorpus, CorpusExtractor, CraftCorpus,
    DocumentExtractor, ExtractError, Extraction, ExtractionStats, MedMentionsCorpus,
    NcbiDiseaseCorpus, PbdmsCorpus, PgrCorpus,
};
use crate::dataset::{
    partition_dir, split_partition, write_partition, DatasetError, PartitionSummary,
};
use crate::driver::ParallelDriver;
use crate::kb::{KbError, KbIndex, KnowledgeBase};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors that stop a pipeline run, with the KB and corpus they came from
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Knowledge base {kb}: {source}")]
    Kb {
        kb: KnowledgeBase,
        #[source]
        source: KbError,
    },

    #[error("Knowledge base {kb}, corpus {corpus}: {source}")]
    Extract {
        kb: KnowledgeBase,
        corpus: String,
        #[source]
        source: ExtractError,
    },

    #[error("Knowledge base {kb}: {source}")]
    Dataset {
        kb: KnowledgeBase,
        #[source]
        source: DatasetError,
    },

    #[error("Knowledge base {kb}, baseline: {source}")]
    Baseline {
        kb: KnowledgeBase,
        #[source]
        source: BaselineError,
    },

    #[error("Knowledge base {kb} is split into 1..={max} PBDMS splits, got split {split:?}")]
    InvalidSplit {
        kb: KnowledgeBase,
        split: Option<u32>,
        max: u32,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// A corpus feeding a KB's dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusSource {
    Pgr,
    MedMentions,
    Pbdms(u32),
    NcbiDisease,
    Bc5cdr,
    Craft,
}

impl CorpusSource {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pgr => "pgr",
            Self::MedMentions => "medmentions",
            Self::Pbdms(_) => "pbdms",
            Self::NcbiDisease => "ncbi_disease",
            Self::Bc5cdr => "bc5cdr",
            Self::Craft => "craft",
        }
    }
}

/// Corpora for a KB in merge order
///
/// `split` selects the PBDMS split and is ignored for KBs without PBDMS.
pub fn corpus_plan(kb: KnowledgeBase, split: u32) -> Vec<CorpusSource> {
    match kb {
        KnowledgeBase::Hp => vec![CorpusSource::Pgr, CorpusSource::MedMentions],
        KnowledgeBase::Chebi | KnowledgeBase::GoBp => vec![CorpusSource::Craft],
        KnowledgeBase::Medic if split == 1 => vec![
            CorpusSource::Pbdms(split),
            CorpusSource::NcbiDisease,
            CorpusSource::Bc5cdr,
        ],
        KnowledgeBase::CtdChemicals if split == 1 => {
            vec![CorpusSource::Pbdms(split), CorpusSource::Bc5cdr]
        }
        KnowledgeBase::Medic | KnowledgeBase::CtdChemicals | KnowledgeBase::CtdAnatomy => {
            vec![CorpusSource::Pbdms(split)]
        }
    }
}

/// Outcome of one corpus pass
#[derive(Debug, Clone)]
pub struct CorpusReport {
    pub corpus: &'static str,
    pub documents: usize,
    pub annotations: usize,
    pub stats: ExtractionStats,
    pub failed_documents: usize,
}

/// Merged annotations for one KB (and split), before partitioning
#[derive(Debug, Clone, Default)]
pub struct AnnotationBuild {
    pub annotations: AnnotationMap,
    pub corpora: Vec<CorpusReport>,
    /// Document ids replaced by a later corpus
    pub collisions: usize,
}

/// Outcome of building and persisting one partition
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub kb: KnowledgeBase,
    pub split: Option<u32>,
    pub output: PathBuf,
    pub partition: PartitionSummary,
    pub corpora: Vec<CorpusReport>,
    pub collisions: usize,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.split {
            Some(split) => writeln!(f, "partition: {} split: {}", self.kb, split)?,
            None => writeln!(f, "partition: {}", self.kb)?,
        }
        for corpus in &self.corpora {
            writeln!(
                f,
                "  {}: {} docs, {} annotations, {} unmapped, {} failed docs",
                corpus.corpus,
                corpus.documents,
                corpus.annotations,
                corpus.stats.unmapped,
                corpus.failed_documents
            )?;
        }
        if self.collisions > 0 {
            writeln!(f, "  {} documents replaced by a later corpus", self.collisions)?;
        }
        write!(f, "{}", self.partition)
    }
}

/// Dataset builder for the configured data and output roots
pub struct Pipeline {
    config: PipelineConfig,
    layout: DataLayout,
    driver: ParallelDriver,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self {
            layout: config.layout(),
            driver: ParallelDriver::new(config.workers),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Load a KB from the data root
    ///
    /// A source with no usable node is reported and yields an empty index,
    /// so every mention of that KB is later dropped as unmapped.
    pub fn load_kb(&self, kb: KnowledgeBase) -> PipelineResult<KbIndex> {
        let mut index = KbIndex::new(kb);
        match index.load(self.layout.kb_file(kb)) {
            Ok(_) => Ok(index),
            Err(e @ KbError::MalformedSource { .. }) => {
                tracing::warn!(kb = %kb, error = %e, "continuing with an empty knowledge base");
                Ok(index)
            }
            Err(source) => Err(PipelineError::Kb { kb, source }),
        }
    }

    /// Splits to build for a KB: the requested one, or all of them
    pub fn splits_for(&self, kb: KnowledgeBase, split: Option<u32>) -> PipelineResult<Vec<Option<u32>>> {
        if !kb.has_pbdms() {
            if split.is_some() {
                tracing::warn!(kb = %kb, "knowledge base has no PBDMS splits, ignoring --split");
            }
            return Ok(vec![None]);
        }
        let max = self.config.pbdms_splits;
        match split {
            None => Ok((1..=max).map(Some).collect()),
            Some(n) if (1..=max).contains(&n) => Ok(vec![Some(n)]),
            Some(_) => Err(PipelineError::InvalidSplit { kb, split, max }),
        }
    }

    /// Run every corpus wired to the KB and merge the results
    pub async fn build_annotations(
        &self,
        kb: &Arc<KbIndex>,
        split: Option<u32>,
    ) -> PipelineResult<AnnotationBuild> {
        let kb_name = kb.kb();
        let split = match (kb_name.has_pbdms(), split) {
            (true, Some(n)) => n,
            (true, None) => {
                return Err(PipelineError::InvalidSplit {
                    kb: kb_name,
                    split,
                    max: self.config.pbdms_splits,
                })
            }
            (false, _) => 1,
        };

        let mut aggregator = AnnotationAggregator::new();
        let mut corpora = Vec::new();

        for source in corpus_plan(kb_name, split) {
            let extraction = self.extract(kb, source).await?;
            extraction.log_summary(kb_name, source.name());

            let report = CorpusReport {
                corpus: source.name(),
                documents: extraction.annotations.len(),
                annotations: extraction.annotations.annotation_count(),
                stats: extraction.stats,
                failed_documents: extraction.failures.len(),
            };
            let replaced = aggregator.absorb(extraction.annotations);
            if replaced > 0 {
                tracing::info!(kb = %kb_name, corpus = source.name(), replaced, "documents replaced by later corpus");
            }
            corpora.push(report);
        }

        Ok(AnnotationBuild {
            collisions: aggregator.collisions(),
            annotations: aggregator.finish(),
            corpora,
        })
    }

    async fn extract(&self, kb: &Arc<KbIndex>, source: CorpusSource) -> PipelineResult<Extraction> {
        let kb_name = kb.kb();
        let wrap = |e: ExtractError| PipelineError::Extract {
            kb: kb_name,
            corpus: source.name().to_string(),
            source: e,
        };

        match source {
            CorpusSource::Pbdms(split) => {
                let documents = pbdms_documents(&self.layout.pbdms_split(split)).map_err(wrap)?;
                let extractor: Arc<dyn DocumentExtractor> = Arc::new(PbdmsCorpus::new());
                Ok(self.driver.run(Arc::clone(kb), extractor, documents).await)
            }
            CorpusSource::Craft => {
                let dir = self.layout.craft(kb_name).ok_or_else(|| {
                    wrap(ExtractError::UnsupportedKb {
                        corpus: source.name().to_string(),
                        kb: kb_name,
                    })
                })?;
                let documents = craft_documents(&dir).map_err(wrap)?;
                let extractor: Arc<dyn DocumentExtractor> = Arc::new(CraftCorpus::new());
                Ok(self.driver.run(Arc::clone(kb), extractor, documents).await)
            }
            CorpusSource::Pgr => {
                self.extract_blocking(kb, Box::new(PgrCorpus::new()), self.layout.pgr())
                    .await
                    .map_err(wrap)
            }
            CorpusSource::MedMentions => {
                self.extract_blocking(kb, Box::new(MedMentionsCorpus::new()), self.layout.medmentions())
                    .await
                    .map_err(wrap)
            }
            CorpusSource::NcbiDisease => {
                self.extract_blocking(kb, Box::new(NcbiDiseaseCorpus::new()), self.layout.ncbi_disease())
                    .await
                    .map_err(wrap)
            }
            CorpusSource::Bc5cdr => {
                let corpus = Bc5cdrCorpus::for_kb(kb_name).map_err(wrap)?;
                self.extract_blocking(kb, Box::new(corpus), self.layout.bc5cdr())
                    .await
                    .map_err(wrap)
            }
        }
    }

    /// Run a whole-corpus extractor on the blocking pool
    async fn extract_blocking(
        &self,
        kb: &Arc<KbIndex>,
        extractor: Box<dyn CorpusExtractor>,
        path: PathBuf,
    ) -> Result<Extraction, ExtractError> {
        let kb = Arc::clone(kb);
        tokio::task::spawn_blocking(move || extractor.extract(&kb, &path))
            .await
            .unwrap_or_else(|e| Err(ExtractError::Worker(e.to_string())))
    }

    /// Build, partition and persist one KB
    ///
    /// For PBDMS-backed KBs `split` picks a single split; without it every
    /// split from 1 to `pbdms_splits` is built in turn.
    pub async fn build(&self, kb: KnowledgeBase, split: Option<u32>) -> PipelineResult<Vec<BuildReport>> {
        let splits = self.splits_for(kb, split)?;
        let index = Arc::new(self.load_kb(kb)?);
        let mut reports = Vec::with_capacity(splits.len());

        for split in splits {
            let build = self.build_annotations(&index, split).await?;
            let partition = split_partition(build.annotations, self.config.seed);
            let output = partition_dir(&self.config.output_root, kb, split);
            let summary = write_partition(&output, &partition)
                .map_err(|source| PipelineError::Dataset { kb, source })?;

            tracing::info!(
                kb = %kb,
                split = ?split,
                documents = summary.total(),
                collisions = build.collisions,
                "partition built"
            );
            reports.push(BuildReport {
                kb,
                split,
                output,
                partition: summary,
                corpora: build.corpora,
                collisions: build.collisions,
            });
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_plan_wiring() {
        use CorpusSource::*;
        assert_eq!(corpus_plan(KnowledgeBase::Hp, 1), vec![Pgr, MedMentions]);
        assert_eq!(
            corpus_plan(KnowledgeBase::Medic, 1),
            vec![Pbdms(1), NcbiDisease, Bc5cdr]
        );
        assert_eq!(corpus_plan(KnowledgeBase::Medic, 4), vec![Pbdms(4)]);
        assert_eq!(corpus_plan(KnowledgeBase::CtdChemicals, 1), vec![Pbdms(1), Bc5cdr]);
        assert_eq!(corpus_plan(KnowledgeBase::CtdAnatomy, 1), vec![Pbdms(1)]);
        assert_eq!(corpus_plan(KnowledgeBase::GoBp, 1), vec![Craft]);
    }

    #[test]
    fn test_splits_for() {
        let pipeline = Pipeline::new(PipelineConfig::new().with_pbdms_splits(3)).unwrap();
        assert_eq!(pipeline.splits_for(KnowledgeBase::Chebi, Some(2)).unwrap(), vec![None]);
        assert_eq!(
            pipeline.splits_for(KnowledgeBase::Medic, None).unwrap(),
            vec![Some(1), Some(2), Some(3)]
        );
        assert_eq!(pipeline.splits_for(KnowledgeBase::Medic, Some(2)).unwrap(), vec![Some(2)]);
        assert!(matches!(
            pipeline.splits_for(KnowledgeBase::Medic, Some(4)),
            Err(PipelineError::InvalidSplit { .. })
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            Pipeline::new(PipelineConfig::new().with_workers(0)),
            Err(PipelineError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_missing_kb_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(PipelineConfig::new().with_data_root(dir.path())).unwrap();
        assert!(matches!(
            pipeline.load_kb(KnowledgeBase::Hp),
            Err(PipelineError::Kb {
                source: KbError::SourceNotFound { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_kb_continues_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("kb_files")).unwrap();
        std::fs::write(dir.path().join("kb_files/hp.obo"), "format-version: 1.2\n").unwrap();

        let pipeline = Pipeline::new(PipelineConfig::new().with_data_root(dir.path())).unwrap();
        let index = pipeline.load_kb(KnowledgeBase::Hp).unwrap();
        assert!(index.is_empty());
    }
}

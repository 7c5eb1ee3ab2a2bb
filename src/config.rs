//! Pipeline configuration and input layout
//!
//! Settings are resolved in three layers: built-in defaults, then a YAML
//! file, then command-line overrides applied by the caller through the
//! `with_*` builders. The YAML file is either given explicitly or looked up
//! at `<config_dir>/evanil/config.yaml`.
//!
//! ```yaml
//! data_root: ./retrieved_data
//! output_root: ./dataset
//! workers: 10
//! seed: 100
//! pbdms_splits: 29
//! baseline:
//!   exclude_gold_candidate: true
//!   write_answers: true
//! ```

use crate::kb::KnowledgeBase;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while resolving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for the fuzzy-matching baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Skip the best candidate when it is the gold concept itself
    pub exclude_gold_candidate: bool,
    /// Write the per-annotation answers CSV next to the dataset
    pub write_answers: bool,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            exclude_gold_candidate: true,
            write_answers: true,
        }
    }
}

/// Top-level pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the downloaded KB files and corpora
    pub data_root: PathBuf,
    /// Where partitions are written
    pub output_root: PathBuf,
    /// Concurrent extraction workers for large corpora
    pub workers: usize,
    /// Partition shuffle seed
    pub seed: u64,
    /// Number of PBDMS split files
    pub pbdms_splits: u32,
    pub baseline: BaselineConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineConfig {
    pub const DEFAULT_WORKERS: usize = crate::driver::DEFAULT_WORKERS;
    pub const DEFAULT_SEED: u64 = 100;
    pub const DEFAULT_PBDMS_SPLITS: u32 = 29;

    pub fn new() -> Self {
        Self {
            data_root: PathBuf::from("./retrieved_data"),
            output_root: PathBuf::from("./dataset"),
            workers: Self::DEFAULT_WORKERS,
            seed: Self::DEFAULT_SEED,
            pbdms_splits: Self::DEFAULT_PBDMS_SPLITS,
            baseline: BaselineConfig::default(),
        }
    }

    /// Default location of the user config file, if a config dir exists
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("evanil").join("config.yaml"))
    }

    /// Parse a YAML document; missing keys keep their defaults
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Io(e),
        })?;
        Self::from_yaml(&content)
    }

    /// Resolve defaults and the config file
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used only when a file is present there.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading user config");
                Self::from_file(&path)
            }
            _ => Ok(Self::new()),
        }
    }

    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = root.into();
        self
    }

    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_pbdms_splits(mut self, splits: u32) -> Self {
        self.pbdms_splits = splits;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.pbdms_splits == 0 {
            return Err(ConfigError::Invalid("pbdms_splits must be at least 1".into()));
        }
        Ok(())
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_root)
    }
}

/// Locations of KB files and corpora under the data root
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kb_file(&self, kb: KnowledgeBase) -> PathBuf {
        self.root.join("kb_files").join(kb.file_name())
    }

    fn corpora(&self) -> PathBuf {
        self.root.join("corpora")
    }

    pub fn ncbi_disease(&self) -> PathBuf {
        self.corpora().join("NCBI_disease_corpus")
    }

    pub fn bc5cdr(&self) -> PathBuf {
        self.corpora()
            .join("BioCreative-V-CDR-Corpus")
            .join("CDR_Data")
            .join("CDR.Corpus.v010516")
    }

    /// Knowtator directory for a CRAFT-backed KB
    pub fn craft(&self, kb: KnowledgeBase) -> Option<PathBuf> {
        let ontology = match kb {
            KnowledgeBase::Chebi => "CHEBI",
            KnowledgeBase::GoBp => "GO_BP",
            _ => return None,
        };
        Some(
            self.corpora()
                .join("CRAFT-4.0.1")
                .join("concept-annotation")
                .join(ontology)
                .join(ontology)
                .join("knowtator"),
        )
    }

    pub fn medmentions(&self) -> PathBuf {
        self.corpora().join("MedMentions").join("corpus_pubtator.txt")
    }

    pub fn pgr(&self) -> PathBuf {
        self.corpora().join("PGR")
    }

    pub fn pbdms_split(&self, split: u32) -> PathBuf {
        self.corpora()
            .join("pubmed_ds")
            .join(format!("split_{}.txt", split))
    }
}

//! Dataset partitions on disk
//!
//! A built annotation map is shuffled into train/dev/test partitions and
//! persisted as one JSON object per subset:
//!
//! ```text
//! <output_root>/<kb>/train.json
//! <output_root>/<kb>/split_<n>/test.json     (PBDMS-backed KBs)
//! ```
//!
//! [`retrieve_annotations`] reads them back for statistics and the baseline.

mod partition;
mod stats;

pub use partition::{
    partition_dir, retrieve_annotations, split_partition, write_partition, Partition,
    PartitionSummary, Subset,
};
pub use stats::{CorpusStatistics, WordHistogram};

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while persisting or reloading partitions
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Partition file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid partition file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;

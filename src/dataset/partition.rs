//! Train/dev/test partitioning and persistence

use super::{DatasetError, DatasetResult};
use crate::annotation::AnnotationMap;
use crate::kb::KnowledgeBase;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const JSON_INDENT: &[u8] = b"    ";

/// One of the three dataset subsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subset {
    Train,
    Dev,
    Test,
}

impl Subset {
    pub const ALL: [Subset; 3] = [Subset::Train, Subset::Dev, Subset::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Dev => "dev",
            Self::Test => "test",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A map split into disjoint train/dev/test subsets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub train: AnnotationMap,
    pub dev: AnnotationMap,
    pub test: AnnotationMap,
}

impl Partition {
    pub fn subset(&self, subset: Subset) -> &AnnotationMap {
        match subset {
            Subset::Train => &self.train,
            Subset::Dev => &self.dev,
            Subset::Test => &self.test,
        }
    }

    fn subset_mut(&mut self, subset: Subset) -> &mut AnnotationMap {
        match subset {
            Subset::Train => &mut self.train,
            Subset::Dev => &mut self.dev,
            Subset::Test => &mut self.test,
        }
    }

    pub fn summary(&self) -> PartitionSummary {
        PartitionSummary {
            train: self.train.len(),
            dev: self.dev.len(),
            test: self.test.len(),
        }
    }
}

/// Document counts per subset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionSummary {
    pub train: usize,
    pub dev: usize,
    pub test: usize,
}

impl PartitionSummary {
    pub fn total(&self) -> usize {
        self.train + self.dev + self.test
    }
}

impl fmt::Display for PartitionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total docs: {} | train: {} | dev: {} | test: {}",
            self.total(),
            self.train,
            self.dev,
            self.test
        )
    }
}

/// Shuffle document ids with a fixed seed and cut 80/10/10
///
/// Ids are taken in sorted order before the shuffle, so the same map and
/// seed always give the same partition.
pub fn split_partition(annotations: AnnotationMap, seed: u64) -> Partition {
    let mut ids: Vec<String> = annotations.document_ids().map(str::to_string).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    ids.shuffle(&mut rng);

    let n = ids.len();
    let train_end = n * 8 / 10;
    let dev_end = n * 9 / 10;

    let assignment: HashMap<String, Subset> = ids
        .into_iter()
        .enumerate()
        .map(|(i, id)| {
            let subset = if i < train_end {
                Subset::Train
            } else if i < dev_end {
                Subset::Dev
            } else {
                Subset::Test
            };
            (id, subset)
        })
        .collect();

    let mut partition = Partition::default();
    for (document, list) in annotations {
        if let Some(subset) = assignment.get(&document) {
            partition.subset_mut(*subset).insert_document(document, list);
        }
    }
    partition
}

/// Output directory for a KB, with the PBDMS split level when given
pub fn partition_dir(output_root: &Path, kb: KnowledgeBase, split: Option<u32>) -> PathBuf {
    let dir = output_root.join(kb.as_str());
    match split {
        Some(n) => dir.join(format!("split_{}", n)),
        None => dir,
    }
}

/// Write `train.json`, `dev.json` and `test.json` under `dir`
pub fn write_partition(dir: &Path, partition: &Partition) -> DatasetResult<PartitionSummary> {
    fs::create_dir_all(dir)?;
    for subset in Subset::ALL {
        let path = dir.join(subset.file_name());
        write_json(&path, partition.subset(subset))?;
    }

    let summary = partition.summary();
    tracing::info!(
        dir = %dir.display(),
        total = summary.total(),
        train = summary.train,
        dev = summary.dev,
        test = summary.test,
        "partition written"
    );
    Ok(summary)
}

fn write_json(path: &Path, map: &AnnotationMap) -> DatasetResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    map.serialize(&mut serializer).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush()?;
    Ok(())
}

fn read_json(path: &Path) -> DatasetResult<AnnotationMap> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DatasetError::NotFound(path.to_path_buf()),
        _ => DatasetError::Io(e),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Reload persisted partitions of a KB into one map
///
/// `subset` restricts the load to one subset; `None` loads all three. For
/// PBDMS-backed KBs every split from 1 to `pbdms_splits` is read. Files are
/// read in order and a later file's document replaces an earlier one.
pub fn retrieve_annotations(
    output_root: &Path,
    kb: KnowledgeBase,
    subset: Option<Subset>,
    pbdms_splits: u32,
) -> DatasetResult<AnnotationMap> {
    let subsets: Vec<Subset> = match subset {
        Some(s) => vec![s],
        None => Subset::ALL.to_vec(),
    };
    let dirs: Vec<PathBuf> = if kb.has_pbdms() {
        (1..=pbdms_splits)
            .map(|n| partition_dir(output_root, kb, Some(n)))
            .collect()
    } else {
        vec![partition_dir(output_root, kb, None)]
    };

    let mut annotations = AnnotationMap::new();
    for dir in &dirs {
        for subset in &subsets {
            for (document, list) in read_json(&dir.join(subset.file_name()))? {
                annotations.insert_document(document, list);
            }
        }
    }
    tracing::debug!(kb = %kb, documents = annotations.len(), "annotations retrieved");
    Ok(annotations)
}

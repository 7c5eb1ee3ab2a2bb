//! CTD tabular thesaurus reader (CTD_chemicals.tsv, CTD_anatomy.tsv)

use super::index::{open_source, strip_mesh_prefix, KbIndex, KbResult, LoadStats};
use csv::ReaderBuilder;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Physical lines of the commented header block, skipped by count
/// whatever they contain
pub const THESAURUS_HEADER_ROWS: usize = 29;

/// Length of the vocabulary prefix on the id column (`MESH:`)
const ID_PREFIX_LEN: usize = 5;

const NAME_COLUMN: usize = 0;
const ID_COLUMN: usize = 1;
const PARENTS_COLUMN: usize = 4;
const SYNONYMS_COLUMN: usize = 7;

pub(super) fn load_thesaurus(index: &mut KbIndex, path: &Path) -> KbResult<LoadStats> {
    let kb = index.kb();
    let mut file = BufReader::new(open_source(kb, path)?);
    let mut line = Vec::new();
    for _ in 0..THESAURUS_HEADER_ROWS {
        line.clear();
        if file.read_until(b'\n', &mut line)? == 0 {
            break;
        }
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(file);
    let mut stats = LoadStats::default();

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                tracing::debug!(kb = %kb, error = %e, "skipping unreadable thesaurus row");
                stats.malformed_rows += 1;
                continue;
            }
        };
        stats.nodes_seen += 1;

        if record.len() <= SYNONYMS_COLUMN {
            stats.malformed_rows += 1;
            continue;
        }

        let name = &record[NAME_COLUMN];
        let id = match record[ID_COLUMN].get(ID_PREFIX_LEN..) {
            Some(id) if !id.is_empty() && !name.is_empty() => id,
            _ => {
                stats.malformed_rows += 1;
                continue;
            }
        };
        stats.nodes_with_required_fields += 1;
        stats.nodes_admitted += 1;
        index.insert_name(name, id);

        let parents: Vec<&str> = split_multi(&record[PARENTS_COLUMN])
            .map(strip_mesh_prefix)
            .collect();
        stats.record_ancestry(index.add_ancestors(id, &parents));

        for synonym in split_multi(&record[SYNONYMS_COLUMN]) {
            index.insert_synonym(synonym, id);
            stats.synonyms += 1;
        }
    }

    tracing::debug!(kb = %kb, path = %path.display(), rows = stats.nodes_seen, "parsed thesaurus");
    Ok(stats)
}

/// Split a `|`-delimited field, ignoring empty entries
fn split_multi(field: &str) -> impl Iterator<Item = &str> {
    field.split('|').map(str::trim).filter(|s| !s.is_empty())
}

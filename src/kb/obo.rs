//! OBO flat-file reader
//!
//! Reads `[Term]` stanzas into [`OboTerm`] records and applies the
//! per-KB admission rules when populating a [`KbIndex`].

use super::index::{open_source, strip_mesh_prefix, KbIndex, KbResult, LoadStats};
use super::KnowledgeBase;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// GO namespace admitted for the biological process KB
const GO_BP_NAMESPACE: &str = "biological_process";

/// MEDIC ids of this class are excluded from the index
const MEDIC_EXCLUDED_PREFIX: &str = "OMIM";

/// UMLS cross-references populate the external id table (HPO only)
const UMLS_PREFIX: &str = "UMLS:";

/// The tags of one `[Term]` stanza that the index needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OboTerm {
    pub id: Option<String>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub is_a: Vec<String>,
    /// Raw synonym values, e.g. `"heart attack" EXACT []`
    pub synonyms: Vec<String>,
    pub xrefs: Vec<String>,
    pub obsolete: bool,
}

/// Parse all `[Term]` stanzas from an OBO document
///
/// Header tags, `[Typedef]` and `[Instance]` stanzas are ignored.
pub fn parse_terms<R: BufRead>(reader: R) -> io::Result<Vec<OboTerm>> {
    let mut terms = Vec::new();
    let mut current: Option<OboTerm> = None;

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('!') {
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            terms.extend(current.take());
            if trimmed == "[Term]" {
                current = Some(OboTerm::default());
            }
            continue;
        }

        let Some(term) = current.as_mut() else {
            continue;
        };
        let Some((tag, value)) = split_tag_line(trimmed) else {
            continue;
        };

        match tag {
            "id" => term.id = Some(value.to_string()),
            "name" => term.name = Some(value.to_string()),
            "namespace" => term.namespace = Some(value.to_string()),
            "is_a" => term.is_a.push(value.to_string()),
            "synonym" => term.synonyms.push(value.to_string()),
            "xref" => term.xrefs.push(value.to_string()),
            "is_obsolete" => term.obsolete = value == "true",
            _ => {}
        }
    }

    terms.extend(current.take());
    Ok(terms)
}

/// Split `tag: value {modifiers} ! comment` into tag and bare value
fn split_tag_line(line: &str) -> Option<(&str, &str)> {
    let (tag, rest) = line.split_once(':')?;
    let value = strip_trailing_modifier(strip_comment(rest.trim()));
    Some((tag.trim(), value))
}

/// Cut an unquoted, unescaped `!` comment
fn strip_comment(value: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            '!' if !in_quotes => return value[..i].trim_end(),
            _ => {}
        }
    }
    value
}

/// Cut a trailing `{...}` modifier block outside quotes
fn strip_trailing_modifier(value: &str) -> &str {
    if !value.ends_with('}') {
        return value;
    }
    let mut in_quotes = false;
    let mut escaped = false;
    let mut open = None;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            '{' if !in_quotes => open = Some(i),
            _ => {}
        }
    }
    match open {
        Some(i) => value[..i].trim_end(),
        None => value,
    }
}

/// The quoted text of a synonym value
fn synonym_text(value: &str) -> Option<&str> {
    let mut parts = value.split('"');
    parts.next()?;
    parts.next().filter(|s| !s.is_empty())
}

/// Apply the KB's admission rule, returning the id to index under
fn admit(kb: KnowledgeBase, id: &str, namespace: Option<&str>) -> Option<String> {
    match kb {
        KnowledgeBase::GoBp => (namespace == Some(GO_BP_NAMESPACE)).then(|| id.to_string()),
        KnowledgeBase::Medic if id.starts_with(MEDIC_EXCLUDED_PREFIX) => None,
        _ if kb.uses_mesh_ids() => Some(strip_mesh_prefix(id).to_string()),
        _ => Some(id.to_string()),
    }
}

pub(super) fn load_obo(index: &mut KbIndex, path: &Path) -> KbResult<LoadStats> {
    let kb = index.kb();
    let reader = BufReader::new(open_source(kb, path)?);
    let terms = parse_terms(reader)?;
    let mut stats = LoadStats::default();

    for term in terms {
        if term.obsolete {
            continue;
        }
        stats.nodes_seen += 1;

        let (Some(raw_id), Some(name)) = (term.id.as_deref(), term.name.as_deref()) else {
            continue;
        };
        stats.nodes_with_required_fields += 1;

        let Some(id) = admit(kb, raw_id, term.namespace.as_deref()) else {
            continue;
        };
        stats.nodes_admitted += 1;
        index.insert_name(name, id.as_str());

        let parents: Vec<&str> = if kb.uses_mesh_ids() {
            term.is_a.iter().map(|p| strip_mesh_prefix(p)).collect()
        } else {
            term.is_a.iter().map(String::as_str).collect()
        };
        stats.record_ancestry(index.add_ancestors(&id, &parents));

        for synonym in term.synonyms.iter().filter_map(|s| synonym_text(s)) {
            index.insert_synonym(synonym, id.as_str());
            stats.synonyms += 1;
        }

        if kb == KnowledgeBase::Hp {
            for umls in term.xrefs.iter().filter_map(|x| x.strip_prefix(UMLS_PREFIX)) {
                index.insert_external(umls.trim(), id.as_str());
                stats.external_refs += 1;
            }
        }
    }

    tracing::debug!(kb = %kb, path = %path.display(), terms = stats.nodes_seen, "parsed OBO file");
    Ok(stats)
}

//! MedMentions PubTator corpus, normalized against HPO through UMLS
//!
//! The corpus is large, so it is read line by line. Title (`|t|`) and
//! abstract (`|a|`) lines are skipped; mention lines carry a UMLS CUI that is
//! translated to an HPO id through the KB's cross-reference table before
//! the ancestor lookup.

use super::{
    open_corpus_file, parse_offset, tab_fields, CorpusExtractor, CorpusLines, ExtractResult,
    Extraction,
};
use crate::annotation::IdStyle;
use crate::kb::KbIndex;
use std::io::BufReader;
use std::path::Path;

const MENTION_FIELDS: usize = 6;
const UMLS_PREFIX: &str = "UMLS:";

/// MedMentions (`corpus_pubtator.txt`)
#[derive(Debug, Clone, Default)]
pub struct MedMentionsCorpus {
    style: IdStyle,
}

impl MedMentionsCorpus {
    pub const FILE: &'static str = "corpus_pubtator.txt";

    pub fn new() -> Self {
        Self::default()
    }

    fn is_marker_line(line: &str) -> bool {
        line.contains("|t|") || line.contains("|a|") || line.trim().is_empty()
    }
}

impl CorpusExtractor for MedMentionsCorpus {
    fn name(&self) -> &str {
        "medmentions"
    }

    /// `source` is the PubTator file itself
    fn extract(&self, kb: &KbIndex, source: &Path) -> ExtractResult<Extraction> {
        let reader = BufReader::new(open_corpus_file(self.name(), source)?);
        let mut extraction = Extraction::default();

        for line in CorpusLines::new(reader) {
            let Some(line) = line? else {
                extraction.stats.malformed += 1;
                continue;
            };
            if Self::is_marker_line(&line) {
                continue;
            }
            extraction.stats.records += 1;

            let fields = tab_fields(&line);
            if fields.len() < MENTION_FIELDS {
                extraction.stats.malformed += 1;
                continue;
            }
            let (Some(start), Some(end)) = (parse_offset(fields[1]), parse_offset(fields[2])) else {
                extraction.stats.malformed += 1;
                continue;
            };

            let cui = fields[5].trim();
            let cui = cui.strip_prefix(UMLS_PREFIX).unwrap_or(cui);
            let Some(hp_id) = kb.translate_external(cui) else {
                extraction.stats.untranslated += 1;
                continue;
            };

            match super::resolve_mention(kb, self.style, fields[3], start, end, hp_id) {
                Some(annotation) => {
                    extraction.stats.emitted += 1;
                    extraction.annotations.push(fields[0], annotation);
                }
                None => extraction.stats.unmapped += 1,
            }
        }

        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::KnowledgeBase;
    use std::fs;

    fn hp_index() -> KbIndex {
        let mut kb = KbIndex::new(KnowledgeBase::Hp);
        kb.add_ancestors("HP:0001250", &["HP:0012638"]);
        kb.add_ancestors("HP:0002027", &["HP:0011458", "HP:0012531"]);
        kb.insert_external("C0036572", "HP:0001250");
        kb.insert_external("C0000737", "HP:0002027");
        kb
    }

    #[test]
    fn test_translates_through_umls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MedMentionsCorpus::FILE);
        fs::write(
            &path,
            "25763772|t|DCTN4 as a modifier\n\
             25763772|a|Pseudomonas aeruginosa\n\
             25763772\t0\t8\tseizures\tT047\tC0036572\n\
             25763772\t9\t23\tabdominal pain\tT184\tUMLS:C0000737\n\
             25763772\t30\t35\tDCTN4\tT116,T123\tC4308010\n\
             25763772\t40\n\
             \n",
        )
        .unwrap();

        let out = MedMentionsCorpus::new().extract(&hp_index(), &path).unwrap();
        let doc = out.annotations.get("25763772").unwrap();

        assert_eq!(doc.len(), 1);
        assert_eq!(doc[0].concept_id, "HP:0001250");
        assert_eq!(doc[0].ancestor_id, "HP:0012638");
        assert_eq!(out.stats.unmapped, 1);
        assert_eq!(out.stats.untranslated, 1);
        assert_eq!(out.stats.malformed, 1);
    }

    #[test]
    fn test_undecodable_line_does_not_end_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MedMentionsCorpus::FILE);
        let mut bytes = b"100\t0\t8\tseizures\tT047\tUMLS:C0036572\n".to_vec();
        bytes.extend_from_slice(b"100\t9\t12\t\xff\xfe\tT047\tUMLS:C0036572\n");
        bytes.extend_from_slice(b"100\t20\t27\tseizure\tT047\tUMLS:C0036572\n");
        fs::write(&path, bytes).unwrap();

        let out = MedMentionsCorpus::new().extract(&hp_index(), &path).unwrap();
        let doc = out.annotations.get("100").unwrap();

        assert_eq!(doc.len(), 2);
        assert_eq!(doc[0].text, "seizures");
        assert_eq!(doc[1].text, "seizure");
        assert_eq!(out.stats.malformed, 1);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MedMentionsCorpus::FILE);
        assert!(MedMentionsCorpus::new().extract(&hp_index(), &path).is_err());
    }
}

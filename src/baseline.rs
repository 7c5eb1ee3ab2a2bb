//! String-matching baseline for the NIL-ancestor task
//!
//! Each short test annotation (one or two words) is matched against every
//! concept name of its KB with a token-sort similarity. The gold concept is
//! assumed absent from the KB, so when the best match is the gold concept
//! itself the runner-up is taken instead. The answer is correct when it is
//! the gold concept's direct ancestor.

use crate::annotation::{AnnotationMap, IdStyle};
use crate::dataset::{retrieve_annotations, Subset};
use crate::kb::{KbIndex, KnowledgeBase};
use crate::pipeline::{Pipeline, PipelineError, PipelineResult};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

/// KBs evaluated by `baseline all`
pub const ALL_TARGETS: [KnowledgeBase; 3] = [
    KnowledgeBase::Medic,
    KnowledgeBase::CtdAnatomy,
    KnowledgeBase::CtdChemicals,
];

/// Longest surface form, in words, that is evaluated
const MAX_WORDS: usize = 2;

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type BaselineResult<T> = Result<T, BaselineError>;

/// Lowercase, split on anything but word characters, sort tokens, rejoin
fn sort_key(text: &str) -> Vec<char> {
    let lowered = text.to_lowercase();
    let mut tokens: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens.join(" ").chars().collect()
}

/// Longest common subsequence length
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diagonal = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Indel similarity as a whole percentage; empty input scores zero
fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let total = (a.len() + b.len()) as f64;
    (200.0 * lcs_len(a, b) as f64 / total).round_ties_even()
}

/// Token-sort similarity, an integer score in `0.0..=100.0`
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    indel_ratio(&sort_key(a), &sort_key(b))
}

/// One scored KB name
#[derive(Debug, Clone, PartialEq)]
pub struct NameMatch<'a> {
    pub name: &'a str,
    pub id: &'a str,
    pub score: f64,
}

#[derive(Debug, Clone)]
struct NameEntry {
    name: String,
    key: Vec<char>,
    id: String,
}

/// Pre-tokenized KB names, ordered by name so ties resolve the same way
/// on every run
#[derive(Debug, Clone)]
pub struct NameMatcher {
    entries: Vec<NameEntry>,
}

impl NameMatcher {
    pub fn new(kb: &KbIndex) -> Self {
        let mut entries: Vec<NameEntry> = kb
            .names()
            .map(|(name, id)| NameEntry {
                key: sort_key(name),
                name: name.to_string(),
                id: id.to_string(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `limit` best names for `query`, best first
    pub fn top(&self, query: &str, limit: usize) -> Vec<NameMatch<'_>> {
        let query = sort_key(query);
        let mut best: Vec<NameMatch<'_>> = Vec::with_capacity(limit + 1);
        if limit == 0 {
            return best;
        }

        for entry in &self.entries {
            let score = indel_ratio(&query, &entry.key);
            if best.len() == limit && best.last().map_or(false, |m| score <= m.score) {
                continue;
            }
            let at = best.partition_point(|m| m.score >= score);
            best.insert(
                at,
                NameMatch {
                    name: &entry.name,
                    id: &entry.id,
                    score,
                },
            );
            best.truncate(limit);
        }
        best
    }
}

/// A test annotation the baseline is asked to place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub document: String,
    pub text: String,
    /// Gold concept id as persisted
    pub gold: String,
    /// Gold direct ancestor as persisted
    pub ancestor: String,
}

/// Annotations with at most two words, in document order
pub fn candidates(annotations: &AnnotationMap) -> Vec<Candidate> {
    annotations
        .iter()
        .flat_map(|(document, list)| {
            list.iter()
                .filter(|a| a.word_count() <= MAX_WORDS)
                .map(move |a| Candidate {
                    document: document.clone(),
                    text: a.text.clone(),
                    gold: a.concept_id.clone(),
                    ancestor: a.ancestor_id.clone(),
                })
        })
        .collect()
}

/// The baseline's answer for one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub candidate: Candidate,
    /// KB id of the chosen concept; `None` when no name was left to choose
    pub answer: Option<String>,
    pub correct: bool,
}

/// Accuracy over one KB or several
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineReport {
    pub label: String,
    pub documents: usize,
    pub annotations: usize,
    pub correct: usize,
}

impl BaselineReport {
    pub fn from_answers(label: impl Into<String>, answers: &[Answer]) -> Self {
        let mut documents: Vec<&str> = answers.iter().map(|a| a.candidate.document.as_str()).collect();
        documents.sort_unstable();
        documents.dedup();
        Self {
            label: label.into(),
            documents: documents.len(),
            annotations: answers.len(),
            correct: answers.iter().filter(|a| a.correct).count(),
        }
    }

    /// Percentage of correct answers; zero when nothing was evaluated
    pub fn accuracy(&self) -> f64 {
        if self.annotations == 0 {
            return 0.0;
        }
        self.correct as f64 / self.annotations as f64 * 100.0
    }

    /// Sum several reports into a global one
    pub fn combine<'a>(label: impl Into<String>, reports: impl IntoIterator<Item = &'a BaselineReport>) -> Self {
        reports.into_iter().fold(
            Self {
                label: label.into(),
                ..Default::default()
            },
            |mut total, r| {
                total.documents += r.documents;
                total.annotations += r.annotations;
                total.correct += r.correct;
                total
            },
        )
    }
}

impl fmt::Display for BaselineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total docs ({}): {}", self.label, self.documents)?;
        writeln!(f, "Total annotations ({}): {}", self.label, self.annotations)?;
        writeln!(f, "Correct answers: {}", self.correct)?;
        write!(f, "Accuracy ({}): {:.2}", self.label, self.accuracy())
    }
}

/// Fuzzy-matching baseline runner
#[derive(Debug, Clone)]
pub struct Baseline {
    exclude_gold_candidate: bool,
    workers: usize,
}

impl Default for Baseline {
    fn default() -> Self {
        Self::new()
    }
}

impl Baseline {
    pub fn new() -> Self {
        Self {
            exclude_gold_candidate: true,
            workers: crate::driver::DEFAULT_WORKERS,
        }
    }

    /// Whether a best match equal to the gold concept is skipped
    pub fn with_exclude_gold_candidate(mut self, exclude: bool) -> Self {
        self.exclude_gold_candidate = exclude;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Pick an answer for one candidate
    pub fn answer(&self, matcher: &NameMatcher, candidate: Candidate) -> Answer {
        let top = matcher.top(&candidate.text, 2);
        let gold = IdStyle::native(&candidate.gold);
        let answer = match top.first() {
            Some(best) if self.exclude_gold_candidate && best.id == gold => {
                top.get(1).map(|m| m.id.to_string())
            }
            Some(best) => Some(best.id.to_string()),
            None => None,
        };
        let correct = answer.as_deref() == Some(IdStyle::native(&candidate.ancestor));
        Answer {
            candidate,
            answer,
            correct,
        }
    }

    /// Answer every candidate, spreading the work over blocking workers
    ///
    /// Answers come back in candidate order.
    pub async fn evaluate(&self, kb: &KbIndex, candidates: Vec<Candidate>) -> Vec<Answer> {
        let matcher = Arc::new(NameMatcher::new(kb));
        let chunk_size = candidates.len().div_ceil(self.workers).max(1);
        let mut tasks: JoinSet<(usize, Vec<Answer>)> = JoinSet::new();

        let mut remaining = candidates;
        let mut chunk_index = 0;
        while !remaining.is_empty() {
            let rest = remaining.split_off(chunk_size.min(remaining.len()));
            let chunk = std::mem::replace(&mut remaining, rest);
            let matcher = Arc::clone(&matcher);
            let runner = self.clone();
            let index = chunk_index;
            tasks.spawn_blocking(move || {
                let answers = chunk.into_iter().map(|c| runner.answer(&matcher, c)).collect();
                (index, answers)
            });
            chunk_index += 1;
        }

        let mut chunks = Vec::with_capacity(chunk_index);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => tracing::warn!(error = %e, "baseline worker failed, its answers are lost"),
            }
        }
        chunks.sort_by_key(|(index, _)| *index);
        chunks.into_iter().flat_map(|(_, answers)| answers).collect()
    }
}

/// Write `doc,text,gold label,direct ancestor,answer,classification`
pub fn write_answers(path: &Path, answers: &[Answer]) -> BaselineResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["doc", "text", "gold label", "direct ancestor", "answer", "classification"])?;
    for a in answers {
        writer.write_record([
            a.candidate.document.as_str(),
            a.candidate.text.as_str(),
            a.candidate.gold.as_str(),
            a.candidate.ancestor.as_str(),
            a.answer.as_deref().unwrap_or(""),
            if a.correct { "1" } else { "0" },
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Answers file for a KB under the output root
pub fn answers_path(output_root: &Path, kb: KnowledgeBase) -> PathBuf {
    output_root.join(format!("baseline_{}_answers.csv", kb))
}

impl Pipeline {
    /// Evaluate the baseline over a KB's persisted test subsets
    pub async fn run_baseline(&self, kb: KnowledgeBase) -> PipelineResult<BaselineReport> {
        let config = self.config();
        let test = retrieve_annotations(&config.output_root, kb, Some(Subset::Test), config.pbdms_splits)
            .map_err(|source| PipelineError::Dataset { kb, source })?;
        let index = self.load_kb(kb)?;

        let baseline = Baseline::new()
            .with_exclude_gold_candidate(config.baseline.exclude_gold_candidate)
            .with_workers(config.workers);
        let answers = baseline.evaluate(&index, candidates(&test)).await;

        if config.baseline.write_answers {
            let path = answers_path(&config.output_root, kb);
            write_answers(&path, &answers).map_err(|source| PipelineError::Baseline { kb, source })?;
            tracing::info!(kb = %kb, path = %path.display(), "baseline answers written");
        }

        let report = BaselineReport::from_answers(kb.as_str(), &answers);
        tracing::info!(
            kb = %kb,
            documents = report.documents,
            annotations = report.annotations,
            correct = report.correct,
            accuracy = report.accuracy(),
            "baseline evaluated"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotation;

    fn kb() -> KbIndex {
        let mut kb = KbIndex::new(KnowledgeBase::Medic);
        kb.insert_name("Heart Diseases", "D006331");
        kb.insert_name("Cardiovascular Diseases", "D002318");
        kb.insert_name("Diabetes Mellitus", "D003920");
        kb.insert_name("Endocrine System Diseases", "D004700");
        kb
    }

    fn candidate(text: &str, gold: &str, ancestor: &str) -> Candidate {
        Candidate {
            document: "d1".into(),
            text: text.into(),
            gold: gold.into(),
            ancestor: ancestor.into(),
        }
    }

    #[test]
    fn test_token_sort_ignores_order_and_case() {
        assert_eq!(token_sort_ratio("heart diseases", "Diseases, Heart"), 100.0);
        assert!(token_sort_ratio("asthma", "diabetes") < 50.0);
    }

    #[test]
    fn test_token_sort_is_a_rounded_indel_ratio() {
        // lcs("kitten", "sitting") = 4, so 2 * 4 / 13 = 61.5%
        assert_eq!(token_sort_ratio("kitten", "sitting"), 62.0);
        // one insertion: 2 * 6 / 13 = 92.3%
        assert_eq!(token_sort_ratio("asthma", "asthmas"), 92.0);
        assert_eq!(token_sort_ratio("", "asthma"), 0.0);
        assert_eq!(token_sort_ratio("!!", "asthma"), 0.0);
    }

    #[test]
    fn test_top_orders_by_score() {
        let matcher = NameMatcher::new(&kb());
        let top = matcher.top("heart disease", 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id, "D006331");
        assert!(top[0].score >= top[1].score);
        assert!(matcher.top("x", 0).is_empty());
    }

    #[test]
    fn test_gold_candidate_skipped() {
        let matcher = NameMatcher::new(&kb());
        let c = candidate("heart diseases", "MESH:D006331", "MESH:D002318");

        let skipped = Baseline::new().answer(&matcher, c.clone());
        assert_ne!(skipped.answer.as_deref(), Some("D006331"));

        let kept = Baseline::new()
            .with_exclude_gold_candidate(false)
            .answer(&matcher, c);
        assert_eq!(kept.answer.as_deref(), Some("D006331"));
        assert!(!kept.correct);
    }

    #[test]
    fn test_correct_when_answer_is_ancestor() {
        let mut kb = KbIndex::new(KnowledgeBase::Medic);
        kb.insert_name("heart attack", "D009203");
        kb.insert_name("heart disease", "D006331");
        let matcher = NameMatcher::new(&kb);

        let answer = Baseline::new().answer(
            &matcher,
            candidate("heart attack", "https://id.nlm.nih.gov/mesh/D009203", "https://id.nlm.nih.gov/mesh/D006331"),
        );
        assert_eq!(answer.answer.as_deref(), Some("D006331"));
        assert!(answer.correct);
    }

    #[test]
    fn test_candidates_keep_short_mentions() {
        let mut map = AnnotationMap::new();
        map.push("d1", Annotation::new("asthma", 0, 6, "D001249", "D008173"));
        map.push("d1", Annotation::new("type 2 diabetes", 10, 25, "D003924", "D003920"));
        map.push("d2", Annotation::new("heart attack", 0, 12, "D009203", "D006331"));

        let found = candidates(&map);
        let texts: Vec<&str> = found.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["asthma", "heart attack"]);
    }

    #[test]
    fn test_report_accuracy_and_combine() {
        let empty = BaselineReport::default();
        assert_eq!(empty.accuracy(), 0.0);

        let a = BaselineReport {
            label: "medic".into(),
            documents: 2,
            annotations: 4,
            correct: 1,
        };
        let b = BaselineReport {
            label: "ctd_anatomy".into(),
            documents: 1,
            annotations: 4,
            correct: 3,
        };
        let total = BaselineReport::combine("global", [&a, &b]);
        assert_eq!(total.annotations, 8);
        assert_eq!(total.accuracy(), 50.0);
    }

    #[tokio::test]
    async fn test_evaluate_preserves_order() {
        let candidates: Vec<Candidate> = (0..25)
            .map(|i| Candidate {
                document: format!("d{:02}", i),
                ..candidate("heart diseases", "D006331", "D002318")
            })
            .collect();
        let answers = Baseline::new().with_workers(4).evaluate(&kb(), candidates).await;

        assert_eq!(answers.len(), 25);
        assert_eq!(answers[0].candidate.document, "d00");
        assert_eq!(answers[24].candidate.document, "d24");
    }

    #[test]
    fn test_write_answers_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = answers_path(dir.path(), KnowledgeBase::Medic);
        let answers = vec![Answer {
            candidate: candidate("heart attack", "D009203", "D006331"),
            answer: Some("D006331".into()),
            correct: true,
        }];
        write_answers(&path, &answers).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("doc,text,gold label,direct ancestor,answer,classification"));
        assert_eq!(lines.next(), Some("d1,heart attack,D009203,D006331,D006331,1"));
        assert!(path.ends_with("baseline_medic_answers.csv"));
    }
}

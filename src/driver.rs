//! Parallel extraction over a stream of documents
//!
//! The driver fans a [`DocumentExtractor`] out over a bounded number of
//! blocking workers. A permit is taken before the next document is pulled
//! from the input, so no more than `workers` raw documents are held at once
//! even for very large split files.
//!
//! Documents are independent: a document whose extraction fails (or whose
//! worker panics) is recorded as a [`DocumentFailure`] and left out of the
//! map, and the pass continues. Results are folded in input order, so the
//! outcome matches [`extract_sequential`](crate::corpus::extract_sequential)
//! for the same input.

use crate::corpus::{
    DocumentAnnotations, DocumentExtractor, DocumentFailure, ExtractError, ExtractResult,
    Extraction, RawDocument,
};
use crate::kb::KbIndex;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 10;

/// One finished document, tagged with its input position
struct Completed {
    sequence: usize,
    origin: String,
    result: ExtractResult<DocumentAnnotations>,
}

/// Runs a document extractor over many documents concurrently
#[derive(Debug, Clone)]
pub struct ParallelDriver {
    workers: usize,
}

impl Default for ParallelDriver {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl ParallelDriver {
    /// Create a driver; `workers` is clamped to at least one
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Extract every document, sharing `kb` read-only across workers
    ///
    /// `documents` is advanced on the blocking pool, so iterators that read
    /// files never stall the runtime's async workers.
    pub async fn run<I>(
        &self,
        kb: Arc<KbIndex>,
        extractor: Arc<dyn DocumentExtractor>,
        documents: I,
    ) -> Extraction
    where
        I: IntoIterator<Item = ExtractResult<RawDocument>>,
        I::IntoIter: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<Completed> = JoinSet::new();
        let mut completed: Vec<Completed> = Vec::new();
        let mut extraction = Extraction::default();

        let mut documents = Some(documents.into_iter());
        let mut sequence = 0usize;

        loop {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::warn!(error = %e, "worker pool closed, stopping intake");
                    break;
                }
            };
            let Some(mut input) = documents.take() else {
                break;
            };
            // Pulling a document reads from disk, so it happens on the blocking pool
            let pulled = tokio::task::spawn_blocking(move || {
                let next = input.next();
                (next, input)
            })
            .await;
            let next = match pulled {
                Ok((next, input)) => {
                    documents = Some(input);
                    next
                }
                Err(e) => {
                    extraction.failures.push(DocumentFailure {
                        origin: format!("#{}", sequence),
                        reason: ExtractError::Worker(e.to_string()).to_string(),
                    });
                    break;
                }
            };
            let Some(next) = next else {
                break;
            };
            let current = sequence;
            sequence += 1;

            let raw = match next {
                Ok(raw) => raw,
                Err(e) => {
                    completed.push(Completed {
                        sequence: current,
                        origin: format!("#{}", current),
                        result: Err(e),
                    });
                    continue;
                }
            };

            let kb = Arc::clone(&kb);
            let extractor = Arc::clone(&extractor);
            tasks.spawn(async move {
                let _permit = permit;
                let origin = raw.origin.clone();
                let result =
                    tokio::task::spawn_blocking(move || extractor.extract_document(&kb, &raw))
                        .await
                        .unwrap_or_else(|e| Err(ExtractError::Worker(e.to_string())));
                Completed {
                    sequence: current,
                    origin,
                    result,
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(done) => completed.push(done),
                Err(e) => extraction.failures.push(DocumentFailure {
                    origin: "unknown".into(),
                    reason: e.to_string(),
                }),
            }
        }

        completed.sort_by_key(|done| done.sequence);
        for done in completed {
            extraction.absorb_document(done.origin, done.result);
        }

        tracing::debug!(
            extractor = extractor.name(),
            workers = self.workers,
            documents = sequence,
            failures = extraction.failures.len(),
            "parallel pass finished"
        );
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotation;
    use crate::corpus::{extract_sequential, ExtractionStats};
    use crate::kb::KnowledgeBase;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Emits one annotation per document; "bad" fails, "boom" panics
    #[derive(Default)]
    struct ScriptedExtractor {
        active: AtomicUsize,
        peak: AtomicUsize,
        delay: Option<Duration>,
    }

    impl DocumentExtractor for ScriptedExtractor {
        fn name(&self) -> &str {
            "scripted"
        }

        fn extract_document(
            &self,
            _kb: &KbIndex,
            raw: &RawDocument,
        ) -> ExtractResult<DocumentAnnotations> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            let (document, text) = raw.content.split_once(' ').unwrap_or((raw.content.as_str(), ""));
            match text {
                "bad" => Err(ExtractError::ReferentialIntegrity {
                    document: document.to_string(),
                    mention: "m9".into(),
                }),
                "boom" => panic!("extractor blew up"),
                _ => Ok(DocumentAnnotations {
                    document: document.to_string(),
                    annotations: vec![Annotation::new(text, 0, 1, "C", "P")],
                    stats: ExtractionStats {
                        documents: 1,
                        emitted: 1,
                        ..Default::default()
                    },
                }),
            }
        }
    }

    fn docs(contents: &[&str]) -> Vec<ExtractResult<RawDocument>> {
        contents
            .iter()
            .enumerate()
            .map(|(i, c)| Ok(RawDocument::new(format!("line:{}", i + 1), *c)))
            .collect()
    }

    fn kb() -> Arc<KbIndex> {
        Arc::new(KbIndex::new(KnowledgeBase::Medic))
    }

    #[test]
    fn test_workers_clamped() {
        assert_eq!(ParallelDriver::new(0).workers(), 1);
        assert_eq!(ParallelDriver::default().workers(), DEFAULT_WORKERS);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let driver = ParallelDriver::new(3);
        let input = docs(&["d1 a", "d2 bad", "d3 b", "d4 boom", "d5 c"]);
        let out = driver
            .run(kb(), Arc::new(ScriptedExtractor::default()), input)
            .await;

        assert_eq!(out.annotations.len(), 3);
        assert_eq!(out.failures.len(), 2);
        let origins: Vec<&str> = out.failures.iter().map(|f| f.origin.as_str()).collect();
        assert_eq!(origins, vec!["line:2", "line:4"]);
    }

    #[tokio::test]
    async fn test_input_errors_recorded() {
        let driver = ParallelDriver::new(2);
        let input = vec![
            Ok(RawDocument::new("a", "d1 x")),
            Err(ExtractError::Io(std::io::Error::other("disk gone"))),
            Ok(RawDocument::new("c", "d3 y")),
        ];
        let out = driver
            .run(kb(), Arc::new(ScriptedExtractor::default()), input)
            .await;

        assert_eq!(out.annotations.len(), 2);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].origin, "#1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_in_flight_bounded_by_workers() {
        let extractor = Arc::new(ScriptedExtractor {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let contents: Vec<String> = (0..12).map(|i| format!("d{} t", i)).collect();
        let refs: Vec<&str> = contents.iter().map(String::as_str).collect();

        let out = ParallelDriver::new(2)
            .run(kb(), extractor.clone(), docs(&refs))
            .await;

        assert_eq!(out.annotations.len(), 12);
        assert!(extractor.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_documents_are_pulled_off_the_async_thread() {
        let runtime_thread = std::thread::current().id();
        let pulled_on = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = Arc::clone(&pulled_on);
        let mut pending = docs(&["d1 a", "d2 b", "d3 c"]).into_iter();
        let input = std::iter::from_fn(move || {
            seen.lock().unwrap().push(std::thread::current().id());
            pending.next()
        });

        let out = ParallelDriver::new(2)
            .run(kb(), Arc::new(ScriptedExtractor::default()), input)
            .await;

        assert_eq!(out.annotations.len(), 3);
        let threads = pulled_on.lock().unwrap();
        assert_eq!(threads.len(), 4);
        assert!(threads.iter().all(|id| *id != runtime_thread));
    }

    #[tokio::test]
    async fn test_matches_sequential_on_duplicates() {
        let input = ["d1 first", "d2 x", "d1 second"];
        let parallel = ParallelDriver::new(4)
            .run(kb(), Arc::new(ScriptedExtractor::default()), docs(&input))
            .await;
        let sequential = extract_sequential(&ScriptedExtractor::default(), &kb(), docs(&input));

        assert_eq!(parallel.annotations, sequential.annotations);
        assert_eq!(parallel.annotations.get("d1").unwrap()[0].text, "second");
    }
}

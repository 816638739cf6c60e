//! Bounded-concurrency recognition of one track.
//!
//! A fixed pool of workers drains a shared queue of segments. Each worker
//! has at most one request in flight, so the backend never sees more than
//! `concurrency` requests at once. Results come back through a completion
//! channel in whatever order they finish and are re-sorted by time.
//!
//! A segment whose request fails, panics or times out contributes no words.
//! Nothing is retried.

use crate::audio::wav::encode_wav;
use crate::config::RecognitionConfig;
use crate::error::{AlignError, Result};
use crate::recognition::recognizer::{RecognitionRequest, Recognizer};
use crate::recognition::segmenter::Segment;
use crate::recognition::transcript::{Transcript, Word};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Receives progress notifications while tracks are recognized.
pub trait ProgressObserver: Send + Sync {
    /// A track is about to be recognized in `segments` requests.
    fn track_started(&self, _track: &str, _segments: usize) {}

    /// One segment finished, successfully or not.
    fn segment_finished(&self, _index: usize, _ok: bool) {}

    /// A track's transcript is complete.
    fn track_finished(&self, _track: &str, _words: usize) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Outcome counts for one scheduled track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub segments: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ScheduleReport {
    /// True when no segment produced a result.
    pub fn all_failed(&self) -> bool {
        self.segments > 0 && self.succeeded == 0
    }
}

struct Completion {
    index: usize,
    result: Result<Vec<Word>>,
}

/// Runs recognition requests for a track with bounded concurrency.
pub struct Scheduler {
    recognizer: Arc<dyn Recognizer>,
    concurrency: usize,
    timeout: Duration,
    language: String,
}

impl Scheduler {
    /// Create a scheduler for a configured backend.
    ///
    /// # Errors
    /// Returns `BackendConfig` if the recognizer reports it is not usable;
    /// no request is made in that case.
    pub fn new(recognizer: Arc<dyn Recognizer>, config: &RecognitionConfig) -> Result<Self> {
        if !recognizer.is_ready() {
            return Err(AlignError::BackendConfig {
                message: format!("{} is not configured", recognizer.name()),
            });
        }
        Ok(Self {
            recognizer,
            concurrency: config.concurrency.max(1),
            timeout: config.request_timeout(),
            language: config.language.clone(),
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Recognize all segments of one track and assemble its transcript.
    pub async fn transcribe(
        &self,
        segments: Vec<Segment>,
        observer: &dyn ProgressObserver,
    ) -> (Transcript, ScheduleReport) {
        let mut report = ScheduleReport {
            segments: segments.len(),
            ..Default::default()
        };
        if segments.is_empty() {
            return (Transcript::default(), report);
        }

        let workers = self.concurrency.min(segments.len());
        let queue = Arc::new(Mutex::new(segments.into_iter().collect::<VecDeque<_>>()));
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let queue = queue.clone();
            let tx = tx.clone();
            let recognizer = self.recognizer.clone();
            let language = self.language.clone();
            let timeout = self.timeout;
            pool.spawn(async move {
                while let Some(segment) = next_segment(&queue) {
                    debug!("Worker {} took segment {}", worker, segment.index);
                    let completion = recognize_segment(&recognizer, segment, &language, timeout).await;
                    if tx.send(completion).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut parts: BTreeMap<usize, Vec<Word>> = BTreeMap::new();
        while let Some(completion) = rx.recv().await {
            match completion.result {
                Ok(words) => {
                    report.succeeded += 1;
                    observer.segment_finished(completion.index, true);
                    parts.insert(completion.index, words);
                }
                Err(e) => {
                    report.failed += 1;
                    observer.segment_finished(completion.index, false);
                    warn!("Segment {} contributes no words: {}", completion.index, e);
                }
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                warn!("Recognition worker stopped unexpectedly: {}", e);
            }
        }
        // Segments lost with a crashed worker never reported back
        report.failed = report.segments - report.succeeded;

        (Transcript::assemble(parts.into_values()), report)
    }
}

fn next_segment(queue: &Mutex<VecDeque<Segment>>) -> Option<Segment> {
    match queue.lock() {
        Ok(mut guard) => guard.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

async fn recognize_segment(
    recognizer: &Arc<dyn Recognizer>,
    segment: Segment,
    language: &str,
    timeout: Duration,
) -> Completion {
    let index = segment.index;
    let offset_ms = segment.offset_ms;

    let audio = match encode_wav(&segment.samples) {
        Ok(audio) => audio,
        Err(e) => {
            return Completion {
                index,
                result: Err(e),
            };
        }
    };
    let request = RecognitionRequest::new(index, audio, language);

    // Run the request as its own task so a panic in the backend only
    // loses this segment.
    let recognizer = recognizer.clone();
    let mut handle = tokio::spawn(async move { recognizer.recognize(&request).await });

    let result = match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(Ok(words))) => Ok(words.into_iter().map(|w| w.offset(offset_ms)).collect()),
        Ok(Ok(Err(e))) => Err(e),
        Ok(Err(join_err)) => Err(AlignError::Recognition {
            segment: index,
            message: format!("request task failed: {}", join_err),
        }),
        Err(_) => {
            handle.abort();
            Err(AlignError::Recognition {
                segment: index,
                message: format!("timed out after {:?}", timeout),
            })
        }
    };

    Completion { index, result }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::recognizer::MockRecognizer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(concurrency: usize) -> RecognitionConfig {
        RecognitionConfig {
            concurrency,
            ..Default::default()
        }
    }

    fn segment(index: usize, offset_ms: u64) -> Segment {
        Segment {
            index,
            offset_ms,
            samples: vec![0i16; 160],
        }
    }

    #[test]
    fn test_unready_backend_is_fatal() {
        let recognizer = Arc::new(MockRecognizer::new("nope").unready());
        match Scheduler::new(recognizer, &config(2)) {
            Err(AlignError::BackendConfig { message }) => assert!(message.contains("nope")),
            Err(e) => panic!("Expected BackendConfig, got {:?}", e),
            Ok(_) => panic!("Expected BackendConfig error"),
        }
    }

    #[tokio::test]
    async fn test_no_segments_yields_empty_transcript() {
        let scheduler = Scheduler::new(Arc::new(MockRecognizer::new("mock")), &config(2)).unwrap();
        let (transcript, report) = scheduler.transcribe(Vec::new(), &NoProgress).await;
        assert!(transcript.is_empty());
        assert_eq!(report, ScheduleReport::default());
        assert!(!report.all_failed());
    }

    #[tokio::test]
    async fn test_offsets_applied_and_sorted() {
        let recognizer = MockRecognizer::new("mock")
            .with_segment(0, vec![Word::new("a", 0, 100), Word::new("b", 200, 300)])
            .with_segment(1, vec![Word::new("c", 50, 150)]);
        let scheduler = Scheduler::new(Arc::new(recognizer), &config(2)).unwrap();

        let (transcript, report) = scheduler
            .transcribe(vec![segment(1, 5_000), segment(0, 0)], &NoProgress)
            .await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(
            transcript.words,
            vec![
                Word::new("a", 0, 100),
                Word::new("b", 200, 300),
                Word::new("c", 5_050, 5_150),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let recognizer = Arc::new(
            MockRecognizer::new("slow").with_delay(Duration::from_millis(20)),
        );
        let scheduler = Scheduler::new(recognizer.clone(), &config(2)).unwrap();
        let segments = (0..8).map(|i| segment(i, i as u64 * 1000)).collect();

        let (_, report) = scheduler.transcribe(segments, &NoProgress).await;

        assert_eq!(report.succeeded, 8);
        assert_eq!(recognizer.calls(), 8);
        assert!(
            recognizer.max_in_flight() <= 2,
            "Max in flight was {} (should be <= 2)",
            recognizer.max_in_flight()
        );
        assert_eq!(recognizer.max_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_failed_segment_contributes_nothing() {
        let recognizer = MockRecognizer::new("mock")
            .with_segment(0, vec![Word::new("a", 0, 100)])
            .with_segment(1, vec![Word::new("lost", 0, 100)])
            .with_segment(2, vec![Word::new("c", 0, 100)])
            .failing_on(1);
        let scheduler = Scheduler::new(Arc::new(recognizer), &config(2)).unwrap();

        let (transcript, report) = scheduler
            .transcribe(
                vec![segment(0, 0), segment(1, 1_000), segment(2, 2_000)],
                &NoProgress,
            )
            .await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(transcript.text(), "a c");
    }

    #[tokio::test]
    async fn test_every_segment_failing_yields_empty_transcript() {
        let recognizer = MockRecognizer::new("mock").failing_on(0).failing_on(1);
        let scheduler = Scheduler::new(Arc::new(recognizer), &config(2)).unwrap();

        let (transcript, report) = scheduler
            .transcribe(vec![segment(0, 0), segment(1, 1_000)], &NoProgress)
            .await;

        assert!(transcript.is_empty());
        assert!(report.all_failed());
    }

    struct HangingRecognizer;

    #[async_trait]
    impl Recognizer for HangingRecognizer {
        async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<Word>> {
            if request.segment == 0 {
                std::future::pending::<()>().await;
            }
            Ok(vec![Word::new("ok", 0, 10)])
        }

        fn name(&self) -> &str {
            "hanging"
        }

        fn is_ready(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_timed_out_request_is_dropped() {
        let config = RecognitionConfig {
            concurrency: 1,
            request_timeout_secs: 1,
            ..Default::default()
        };
        let scheduler = Scheduler::new(Arc::new(HangingRecognizer), &config).unwrap();

        let (transcript, report) = scheduler
            .transcribe(vec![segment(0, 0), segment(1, 1_000)], &NoProgress)
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(transcript.words, vec![Word::new("ok", 1_000, 1_010)]);
    }

    struct PanickingRecognizer;

    #[async_trait]
    impl Recognizer for PanickingRecognizer {
        async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<Word>> {
            if request.segment == 1 {
                panic!("backend bug");
            }
            Ok(vec![Word::new("fine", 0, 10)])
        }

        fn name(&self) -> &str {
            "panicking"
        }

        fn is_ready(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_panicking_request_only_loses_its_segment() {
        let scheduler = Scheduler::new(Arc::new(PanickingRecognizer), &config(2)).unwrap();

        let (transcript, report) = scheduler
            .transcribe(
                vec![segment(0, 0), segment(1, 1_000), segment(2, 2_000)],
                &NoProgress,
            )
            .await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(transcript.len(), 2);
    }

    #[derive(Default)]
    struct CountingObserver {
        ok: AtomicUsize,
        failed: AtomicUsize,
    }

    impl ProgressObserver for CountingObserver {
        fn segment_finished(&self, _index: usize, ok: bool) {
            if ok {
                self.ok.fetch_add(1, Ordering::SeqCst);
            } else {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn test_observer_sees_every_segment() {
        let recognizer = MockRecognizer::new("mock").failing_on(2);
        let scheduler = Scheduler::new(Arc::new(recognizer), &config(3)).unwrap();
        let observer = CountingObserver::default();

        scheduler
            .transcribe((0..5).map(|i| segment(i, 0)).collect(), &observer)
            .await;

        assert_eq!(observer.ok.load(Ordering::SeqCst), 4);
        assert_eq!(observer.failed.load(Ordering::SeqCst), 1);
    }
}

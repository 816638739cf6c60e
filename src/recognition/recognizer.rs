use crate::defaults;
use crate::error::{AlignError, Result};
use crate::recognition::transcript::Word;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One segment of audio submitted for recognition.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    /// Segment index within the track.
    pub segment: usize,
    /// WAV-encoded audio.
    pub audio: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Language or model hint for the backend.
    pub language: String,
}

/// Trait for speech recognition backends.
///
/// This trait allows swapping implementations (HTTP service vs mock).
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognize one segment.
    ///
    /// # Returns
    /// Words with times relative to the start of the segment.
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<Word>>;

    /// Name of the backend, for logs
    fn name(&self) -> &str;

    /// Check if the backend is configured and usable
    fn is_ready(&self) -> bool;
}

/// Implement Recognizer for Arc<T> to allow sharing across sessions.
#[async_trait]
impl<T: Recognizer + ?Sized> Recognizer for Arc<T> {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<Word>> {
        (**self).recognize(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock recognizer for testing
///
/// Returns canned words per segment index and records how many requests
/// were in flight at once.
#[derive(Debug, Default)]
pub struct MockRecognizer {
    name: String,
    responses: HashMap<usize, Vec<Word>>,
    failing: HashSet<usize>,
    delay: Duration,
    ready: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockRecognizer {
    /// Create a new mock recognizer that returns no words
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ready: true,
            ..Default::default()
        }
    }

    /// Return `words` for segment `index`
    pub fn with_segment(mut self, index: usize, words: Vec<Word>) -> Self {
        self.responses.insert(index, words);
        self
    }

    /// Fail requests for segment `index`
    pub fn failing_on(mut self, index: usize) -> Self {
        self.failing.insert(index);
        self
    }

    /// Sleep this long inside every request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Report the backend as not configured
    pub fn unready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Total number of requests received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent requests observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for MockRecognizer {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<Word>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&request.segment) {
            return Err(AlignError::Recognition {
                segment: request.segment,
                message: "mock recognition failure".to_string(),
            });
        }
        Ok(self
            .responses
            .get(&request.segment)
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

impl RecognitionRequest {
    /// Request for canonical 16 kHz mono audio.
    pub fn new(segment: usize, audio: Vec<u8>, language: &str) -> Self {
        Self {
            segment,
            audio,
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
            language: language.to_string(),
        }
    }
}

//! Speech recognition of normalized tracks.
//!
//! Tracks are cut into segments, submitted to a [`Recognizer`] by the
//! [`Scheduler`] and reassembled into time-ordered [`Transcript`]s.

#[cfg(feature = "http-backend")]
pub mod http;
pub mod recognizer;
pub mod scheduler;
pub mod segmenter;
pub mod transcript;

#[cfg(feature = "http-backend")]
pub use http::HttpRecognizer;
pub use recognizer::{MockRecognizer, RecognitionRequest, Recognizer};
pub use scheduler::{NoProgress, ProgressObserver, ScheduleReport, Scheduler};
pub use segmenter::{Segment, Segmenter, SegmenterConfig};
pub use transcript::{Transcript, Word};

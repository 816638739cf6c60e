//! dialign - align screenplay dialogue against recorded takes
//!
//! Imports audio takes and a parsed script into a content-addressed cache,
//! transcribes the audio with bounded concurrency, assigns each speaker to
//! the track they were recorded on and finds a timecode for every line.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod matching;
pub mod output;
pub mod recognition;
pub mod script;
pub mod session;
pub mod store;

// Stage seams
pub use recognition::recognizer::Recognizer;
pub use store::transcode::{CommandExecutor, SystemCommandExecutor, Transcoder};

// Core components
pub use engine::Engine;
pub use matching::{LineAligner, SpeakerTrackResolver};
pub use recognition::scheduler::Scheduler;
pub use session::Session;
pub use store::ContentStore;

// Data model
pub use matching::{AlignmentResult, LineMatch, TrackSpeakerMap};
pub use recognition::transcript::{Transcript, Word};
pub use script::{Line, ScriptDocument};
pub use store::{ContentHash, MediaItem, MediaKind};

// Error handling
pub use error::{AlignError, Result};

// Config
pub use config::Config;

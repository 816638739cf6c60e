//! Default configuration constants for dialign.
//!
//! Shared by the config types and the components that fall back to them
//! when constructed without an explicit configuration.

/// Canonical sample rate of normalized audio in Hz.
pub const SAMPLE_RATE: u32 = 16000;

/// Canonical channel count of normalized audio.
pub const CHANNELS: u16 = 1;

/// Default recognition language hint passed to the backend.
pub const DEFAULT_LANGUAGE: &str = "zh";

/// Number of recognition requests allowed in flight per track.
pub const CONCURRENCY: usize = 2;

/// Upper bound for a single recognition request, in seconds.
///
/// A request that exceeds this contributes no words, same as a failed one.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Tracks shorter than this are recognized as one segment.
pub const SHORT_CLIP_MS: u64 = 59_000;

/// Longest segment submitted as one recognition request.
pub const MAX_SEGMENT_MS: u64 = 20_000;

/// Silence longer than this always cuts a segment.
pub const LARGE_GAP_MS: u64 = 500;

/// Silence at least this long is dropped at a length-forced cut.
pub const MIN_VIABLE_GAP_MS: u64 = 450;

/// Silent runs shorter than this do not split voiced regions.
pub const MIN_SILENCE_MS: u64 = 100;

/// RMS level (0.0 to 1.0) below which a frame counts as silence.
pub const SILENCE_THRESHOLD: f32 = 0.01;

/// Analysis frame length for silence detection.
pub const FRAME_MS: u64 = 10;

/// Minimum partial similarity for assigning a speaker to a track.
pub const SPEAKER_ACCEPT_SCORE: u32 = 95;

/// Speakers with less normalized text than this are never matched by content.
pub const SPEAKER_MIN_TEXT_CHARS: usize = 10;

/// Minimum similarity for accepting a line window.
pub const LINE_ACCEPT_SCORE: u32 = 90;

/// Recognized words expected per phonetic unit of a script line.
pub const WORDS_PER_TOKEN: f32 = 1.0;

/// Floor for the expected window length, in words.
pub const MIN_WINDOW_WORDS: usize = 2;

/// Window lengths explored below the expected length.
pub const WINDOW_SLACK_BELOW: usize = 2;

/// Window lengths explored above the expected length.
pub const WINDOW_SLACK_ABOVE: usize = 6;

/// Default project manifest file name.
pub const MANIFEST_FILE: &str = "dialign.toml";

/// Application directory name under the XDG config/cache roots.
pub const APP_DIR: &str = "dialign";

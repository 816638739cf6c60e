//! Content-addressed cache of ingested media and derived artifacts.

pub mod content;
pub mod media;
pub mod transcode;

pub use content::{ArtifactKind, ContentStore, identify};
pub use media::{ContentHash, MediaItem, MediaKind, MediaTable};
pub use transcode::{CommandExecutor, FfmpegTranscoder, SystemCommandExecutor, Transcoder};

//! Error types for dialign.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlignError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to parse project manifest {path}: {message}")]
    ManifestParse { path: String, message: String },

    #[error("Recognition backend is not usable: {message}")]
    BackendConfig { message: String },

    // Per-item errors
    #[error("Can't read {path}: {message}")]
    SourceRead { path: String, message: String },

    #[error("Unsupported media file: {path}")]
    UnsupportedMedia { path: String },

    #[error("Transcoding failed for {path}: {message}")]
    Transcode { path: String, message: String },

    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    #[error("Recognition failed for segment {segment}: {message}")]
    Recognition { segment: usize, message: String },

    // Consistency errors
    #[error("Speakers could not be assigned to a track: {}", speakers.join(", "))]
    UnresolvedSpeakers { speakers: Vec<String> },

    #[error("Speaker {speaker} matches more than one track: {}", tracks.join(", "))]
    SpeakerOnMultipleTracks { speaker: String, tracks: Vec<String> },

    #[error("Missing {kind} artifact for {hash}")]
    MissingArtifact { hash: String, kind: String },

    #[error("{hash} is not an imported script")]
    NotAScript { hash: String },

    #[error("Invalid content hash: {value}")]
    InvalidHash { value: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl AlignError {
    /// Whether processing may continue after excluding the offending item.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AlignError::SourceRead { .. }
                | AlignError::UnsupportedMedia { .. }
                | AlignError::Transcode { .. }
                | AlignError::AudioDecode { .. }
                | AlignError::Recognition { .. }
                | AlignError::MissingArtifact { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AlignError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = AlignError::ConfigInvalidValue {
            key: "recognition.concurrency".to_string(),
            message: "must be at least 1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for recognition.concurrency: must be at least 1"
        );
    }

    #[test]
    fn test_unresolved_speakers_lists_names() {
        let error = AlignError::UnresolvedSpeakers {
            speakers: vec!["ANNA".to_string(), "BORIS".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Speakers could not be assigned to a track: ANNA, BORIS"
        );
    }

    #[test]
    fn test_speaker_on_multiple_tracks_display() {
        let error = AlignError::SpeakerOnMultipleTracks {
            speaker: "ANNA".to_string(),
            tracks: vec!["aaa".to_string(), "bbb".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Speaker ANNA matches more than one track: aaa, bbb"
        );
    }

    #[test]
    fn test_recognition_display() {
        let error = AlignError::Recognition {
            segment: 3,
            message: "timed out".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Recognition failed for segment 3: timed out"
        );
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(
            AlignError::UnsupportedMedia {
                path: "notes.txt".to_string()
            }
            .is_recoverable()
        );
        assert!(
            AlignError::Recognition {
                segment: 0,
                message: "boom".to_string()
            }
            .is_recoverable()
        );
        assert!(
            !AlignError::BackendConfig {
                message: "no token".to_string()
            }
            .is_recoverable()
        );
        assert!(!AlignError::UnresolvedSpeakers { speakers: vec![] }.is_recoverable());
        assert!(!AlignError::Io(io::Error::other("disk full")).is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: AlignError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: AlignError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: AlignError = json_error.into();
        assert!(error.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: AlignError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<AlignError>();
        assert_sync::<AlignError>();
    }
}

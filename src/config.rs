use crate::defaults;
use crate::error::{AlignError, Result};
use crate::matching::aligner::AlignerConfig;
use crate::matching::resolver::ResolverConfig;
use crate::recognition::segmenter::SegmenterConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub recognition: RecognitionConfig,
    pub segmentation: SegmenterConfig,
    pub resolver: ResolverConfig,
    pub aligner: AlignerConfig,
}

/// Artifact cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory for per-project caches (default: ~/.cache/dialign)
    pub root: Option<PathBuf>,
}

/// Recognition backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognitionConfig {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub language: String,
    pub concurrency: usize,
    pub request_timeout_secs: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            concurrency: defaults::CONCURRENCY,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

impl RecognitionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CacheConfig {
    /// Resolved cache root, falling back to the XDG cache directory.
    pub fn resolved_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join(defaults::APP_DIR)
        })
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(AlignError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(AlignError::ConfigParse {
                message: format!("{}: {}", path.display(), e),
            }),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - DIALIGN_ENDPOINT → recognition.endpoint
    /// - DIALIGN_TOKEN → recognition.token
    /// - DIALIGN_LANGUAGE → recognition.language
    /// - DIALIGN_CACHE_DIR → cache.root
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("DIALIGN_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.recognition.endpoint = Some(endpoint);
        }

        if let Ok(token) = std::env::var("DIALIGN_TOKEN")
            && !token.is_empty()
        {
            self.recognition.token = Some(token);
        }

        if let Ok(language) = std::env::var("DIALIGN_LANGUAGE")
            && !language.is_empty()
        {
            self.recognition.language = language;
        }

        if let Ok(dir) = std::env::var("DIALIGN_CACHE_DIR")
            && !dir.is_empty()
        {
            self.cache.root = Some(PathBuf::from(dir));
        }

        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> AlignError {
            AlignError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.recognition.concurrency == 0 {
            return Err(invalid("recognition.concurrency", "must be at least 1"));
        }
        if self.recognition.request_timeout_secs == 0 {
            return Err(invalid(
                "recognition.request_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.segmentation.max_segment_ms == 0 {
            return Err(invalid("segmentation.max_segment_ms", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.segmentation.silence_threshold) {
            return Err(invalid(
                "segmentation.silence_threshold",
                "must be in [0.0, 1.0)",
            ));
        }
        if self.resolver.accept_score > 100 {
            return Err(invalid("resolver.accept_score", "must be at most 100"));
        }
        if self.aligner.accept_score > 100 {
            return Err(invalid("aligner.accept_score", "must be at most 100"));
        }
        if self.aligner.words_per_token <= 0.0 {
            return Err(invalid("aligner.words_per_token", "must be positive"));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/dialign/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(defaults::APP_DIR)
            .join("config.toml")
    }
}

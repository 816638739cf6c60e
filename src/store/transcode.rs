//! Normalization of source files into canonical artifacts.
//!
//! Audio is converted to 16 kHz mono WAV by `ffmpeg`; script JSON is
//! validated and copied verbatim. Audio sources also get an `ffmetadata`
//! sidecar with their container tags. The `CommandExecutor` trait keeps the
//! external tool behind a seam so tests never spawn processes.

use crate::defaults;
use crate::error::{AlignError, Result};
use crate::script::ScriptDocument;
use crate::store::media::MediaKind;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use in concurrent contexts.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments, returning its stdout.
    async fn execute(&self, command: &str, args: &[String]) -> Result<String>;
}

/// Production command executor using tokio::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn execute(&self, command: &str, args: &[String]) -> Result<String> {
        let output = Command::new(command)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AlignError::Other(format!("{} not found in PATH", command))
                } else {
                    AlignError::Other(format!("Failed to execute {}: {}", command, e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AlignError::Other(format!(
                "{} failed with status {:?}: {}",
                command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Produces the canonical artifact for a source file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn normalize(&self, kind: MediaKind, source: &Path, dest: &Path) -> Result<()>;

    /// Write the container metadata of an audio source to `dest`.
    ///
    /// Returns `false` when the transcoder does not extract metadata.
    async fn describe(&self, _source: &Path, _dest: &Path) -> Result<bool> {
        Ok(false)
    }
}

/// Transcoder backed by the `ffmpeg` command line tool.
pub struct FfmpegTranscoder<E: CommandExecutor = SystemCommandExecutor> {
    executor: E,
    program: String,
}

impl FfmpegTranscoder<SystemCommandExecutor> {
    pub fn system() -> Self {
        Self::new(SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> FfmpegTranscoder<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            program: "ffmpeg".to_string(),
        }
    }

    /// Use a specific ffmpeg binary instead of the one in PATH.
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    fn audio_args(source: &Path, dest: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            source.display().to_string(),
            "-f".to_string(),
            "wav".to_string(),
            "-ar".to_string(),
            defaults::SAMPLE_RATE.to_string(),
            "-ac".to_string(),
            defaults::CHANNELS.to_string(),
            "-v".to_string(),
            "0".to_string(),
            "-y".to_string(),
            dest.display().to_string(),
        ]
    }

    fn metadata_args(source: &Path, dest: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            source.display().to_string(),
            "-f".to_string(),
            "ffmetadata".to_string(),
            "-v".to_string(),
            "0".to_string(),
            "-y".to_string(),
            dest.display().to_string(),
        ]
    }
}

#[async_trait]
impl<E: CommandExecutor> Transcoder for FfmpegTranscoder<E> {
    async fn normalize(&self, kind: MediaKind, source: &Path, dest: &Path) -> Result<()> {
        let transcode_err = |message: String| AlignError::Transcode {
            path: source.display().to_string(),
            message,
        };

        match kind {
            MediaKind::Audio => {
                let args = Self::audio_args(source, dest);
                self.executor
                    .execute(&self.program, &args)
                    .await
                    .map_err(|e| transcode_err(e.to_string()))?;
            }
            MediaKind::Script => {
                let text = tokio::fs::read_to_string(source)
                    .await
                    .map_err(|e| transcode_err(e.to_string()))?;
                ScriptDocument::from_json(&text).map_err(|e| transcode_err(e.to_string()))?;
                tokio::fs::write(dest, text)
                    .await
                    .map_err(|e| transcode_err(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn describe(&self, source: &Path, dest: &Path) -> Result<bool> {
        let args = Self::metadata_args(source, dest);
        self.executor
            .execute(&self.program, &args)
            .await
            .map_err(|e| AlignError::Transcode {
                path: source.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(true)
    }
}

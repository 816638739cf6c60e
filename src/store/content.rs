//! Content-addressed artifact store.
//!
//! Every source file is identified by the SHA-1 of its bytes. Derived
//! artifacts (normalized audio, recognition output, alignment results) are
//! stored under that hash, so re-importing an unchanged file never redoes
//! work. Artifacts are written to a temporary name and renamed into place.

use crate::error::{AlignError, Result};
use crate::store::media::{ContentHash, MediaItem, MediaKind, MediaTable};
use crate::store::transcode::Transcoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha1::{Digest, Sha1};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

const READ_CHUNK: usize = 64 * 1024;

/// Kinds of derived artifacts kept per content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// 16 kHz mono WAV, stored as `<hash>`.
    NormalizedAudio,
    /// Recognized transcript, stored as `<hash>.json`.
    Recognition,
    /// Validated script JSON, stored as `<hash>.json`.
    Script,
    /// Alignment result for a script, stored as `<hash>.align.json`.
    Alignment,
    /// Container tags of an audio source, stored as `<hash>.metadata`.
    Metadata,
}

impl ArtifactKind {
    /// The canonical artifact produced at ingestion for a media kind.
    pub fn canonical(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => ArtifactKind::NormalizedAudio,
            MediaKind::Script => ArtifactKind::Script,
        }
    }

    pub fn file_name(self, hash: &ContentHash) -> String {
        match self {
            ArtifactKind::NormalizedAudio => hash.to_string(),
            ArtifactKind::Recognition | ArtifactKind::Script => format!("{hash}.json"),
            ArtifactKind::Alignment => format!("{hash}.align.json"),
            ArtifactKind::Metadata => format!("{hash}.metadata"),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::NormalizedAudio => "normalized audio",
            ArtifactKind::Recognition => "recognition",
            ArtifactKind::Script => "script",
            ArtifactKind::Alignment => "alignment",
            ArtifactKind::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// Compute the content hash of a file with a streaming SHA-1 digest.
pub async fn identify(path: &Path) -> Result<ContentHash> {
    let unreadable = |e: std::io::Error| AlignError::SourceRead {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    let mut file = tokio::fs::File::open(path).await.map_err(unreadable)?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).await.map_err(unreadable)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    format!("{:x}", hasher.finalize()).parse()
}

/// Artifact directory plus the table of ingested paths.
pub struct ContentStore {
    dir: PathBuf,
    table: MediaTable,
    transcoder: Arc<dyn Transcoder>,
}

impl ContentStore {
    /// Open (creating if needed) the store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, transcoder: Arc<dyn Transcoder>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            table: MediaTable::new(),
            transcoder,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table(&self) -> &MediaTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut MediaTable {
        &mut self.table
    }

    pub fn artifact_path(&self, hash: &ContentHash, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name(hash))
    }

    /// Path of an existing artifact, or `None` if it was never produced.
    pub fn materialize(&self, hash: &ContentHash, kind: ArtifactKind) -> Option<PathBuf> {
        let path = self.artifact_path(hash, kind);
        path.is_file().then_some(path)
    }

    /// Store an artifact, replacing any previous one atomically.
    pub async fn put(&self, hash: &ContentHash, kind: ArtifactKind, bytes: &[u8]) -> Result<PathBuf> {
        let dest = self.artifact_path(hash, kind);
        let tmp = self.temp_path(&dest);
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &dest).await?;
        debug!("Stored {} artifact {}", kind, hash.short());
        Ok(dest)
    }

    pub async fn put_json<T: Serialize>(
        &self,
        hash: &ContentHash,
        kind: ArtifactKind,
        value: &T,
    ) -> Result<PathBuf> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.put(hash, kind, &bytes).await
    }

    /// Read a JSON artifact, `None` if it does not exist.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        hash: &ContentHash,
        kind: ArtifactKind,
    ) -> Result<Option<T>> {
        let Some(path) = self.materialize(hash, kind) else {
            return Ok(None);
        };
        let bytes = tokio::fs::read(path).await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Identify a file, record it in the path table and produce its canonical
    /// artifact unless it already exists.
    ///
    /// Unsupported extensions and transcoder failures are recorded with
    /// `hashed == false`; only an unreadable source file is an error.
    pub async fn ingest(&mut self, path: &Path) -> Result<MediaItem> {
        let hash = identify(path).await?;
        let mut item = MediaItem::new(path).with_hash(hash.clone());

        let Some(kind) = item.kind else {
            warn!(
                "{}",
                AlignError::UnsupportedMedia {
                    path: path.display().to_string()
                }
            );
            self.table.upsert(item.clone());
            return Ok(item);
        };

        let artifact = ArtifactKind::canonical(kind);
        if self.materialize(&hash, artifact).is_some() {
            debug!("Cache hit for {} ({})", path.display(), hash.short());
            item.hashed = true;
        } else {
            let dest = self.artifact_path(&hash, artifact);
            let tmp = self.temp_path(&dest);
            match self.transcoder.normalize(kind, path, &tmp).await {
                Ok(()) if tmp.is_file() => {
                    tokio::fs::rename(&tmp, &dest).await?;
                    debug!("Normalized {} -> {}", path.display(), dest.display());
                    item.hashed = true;
                    if kind == MediaKind::Audio {
                        self.store_metadata(path, &hash).await;
                    }
                }
                Ok(()) => {
                    warn!("Can't hash {}: transcoder produced no output", path.display());
                }
                Err(e) => {
                    if let Err(e) = tokio::fs::remove_file(&tmp).await
                        && e.kind() != std::io::ErrorKind::NotFound
                    {
                        warn!("Failed to remove {}: {}", tmp.display(), e);
                    }
                    if !e.is_recoverable() {
                        return Err(e);
                    }
                    warn!("Can't hash {}: {}", path.display(), e);
                }
            }
        }

        self.table.upsert(item.clone());
        Ok(item)
    }

    /// Extract the metadata sidecar of an audio source. Failures only warn.
    async fn store_metadata(&self, path: &Path, hash: &ContentHash) {
        let dest = self.artifact_path(hash, ArtifactKind::Metadata);
        let tmp = self.temp_path(&dest);
        match self.transcoder.describe(path, &tmp).await {
            Ok(true) if tmp.is_file() => match tokio::fs::rename(&tmp, &dest).await {
                Ok(()) => debug!("Stored metadata for {}", hash.short()),
                Err(e) => warn!("Failed to store metadata for {}: {}", path.display(), e),
            },
            Ok(_) => {}
            Err(e) => warn!("No metadata for {}: {}", path.display(), e),
        }
        if let Err(e) = tokio::fs::remove_file(&tmp).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!("Failed to remove {}: {}", tmp.display(), e);
        }
    }

    /// Remove every artifact and forget all ingested paths.
    pub async fn clear(&mut self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        self.table.clear();
        Ok(())
    }

    fn temp_path(&self, dest: &Path) -> PathBuf {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dir
            .join(format!("{}.{}.partial", name, uuid::Uuid::new_v4().simple()))
    }
}

//! Project manifest and the session context handed to every stage.
//!
//! A project is described by a small TOML manifest:
//!
//! ```toml
//! name = "normal"
//! id = "3f2b...c9"
//!
//! [[media]]
//! path = "takes/anna.wav"
//! hash = "a9993e364706816aba3e25717850c26c9cd0d89d"
//! ```
//!
//! The project id selects the cache directory, so two projects never share
//! artifacts. A session opens that directory, rebuilds the path table from
//! the manifest and writes the table back on save.

use crate::config::Config;
use crate::defaults;
use crate::error::{AlignError, Result};
use crate::store::{ArtifactKind, ContentHash, ContentStore, MediaItem, Transcoder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn default_name() -> String {
    "normal".to_string()
}

/// One manifest entry: a source path and its last known content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Human-editable project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub media: Vec<MediaEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// A fresh project with a new id.
    pub fn new() -> Self {
        Self {
            name: default_name(),
            id: uuid::Uuid::new_v4().simple().to_string(),
            media: Vec::new(),
        }
    }

    /// Load a manifest. A missing or blank file starts a new project.
    pub fn load(path: &Path) -> Result<Self> {
        Self::read(path).map(|(manifest, _)| manifest)
    }

    /// Like [`Manifest::load`], also reporting whether the id was generated
    /// rather than read from disk.
    fn read(path: &Path) -> Result<(Self, bool)> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No manifest at {}, starting a new project", path.display());
                return Ok((Self::new(), true));
            }
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok((Self::new(), true));
        }

        let mut manifest: Manifest =
            toml::from_str(&contents).map_err(|e| AlignError::ManifestParse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let generated = manifest.id.trim().is_empty();
        if generated {
            manifest.id = uuid::Uuid::new_v4().simple().to_string();
        }
        Ok((manifest, generated))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AlignError::Other(format!("Failed to serialize manifest: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Default manifest location in the working directory.
    pub fn default_path() -> PathBuf {
        PathBuf::from(defaults::MANIFEST_FILE)
    }
}

/// Explicit context for one project: configuration, manifest and store.
pub struct Session {
    config: Config,
    manifest: Manifest,
    manifest_path: PathBuf,
    store: ContentStore,
}

impl Session {
    /// Open the project described by `manifest_path`.
    ///
    /// Manifest entries whose source file is gone are dropped. An entry
    /// counts as hashed only if its canonical artifact is still cached.
    /// A newly generated project id is written back right away so the next
    /// run finds the same cache directory.
    pub fn open(
        config: Config,
        manifest_path: &Path,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self> {
        let (manifest, generated) = Manifest::read(manifest_path)?;
        if generated {
            manifest.save(manifest_path)?;
            debug!("Assigned project id {} in {}", manifest.id, manifest_path.display());
        }
        let dir = config.cache.resolved_root().join(&manifest.id);
        let mut store = ContentStore::open(&dir, transcoder)?;

        for entry in &manifest.media {
            if !entry.path.is_file() {
                warn!("{} no longer exists, dropping it", entry.path.display());
                continue;
            }
            let mut item = MediaItem::new(&entry.path);
            match entry.hash.as_deref().map(str::parse::<ContentHash>) {
                Some(Ok(hash)) => {
                    item.hashed = item
                        .kind
                        .is_some_and(|kind| store.materialize(&hash, ArtifactKind::canonical(kind)).is_some());
                    item = item.with_hash(hash);
                }
                Some(Err(e)) => warn!("{}: {}", entry.path.display(), e),
                None => {}
            }
            store.table_mut().upsert(item);
        }

        info!(
            "Opened project {} ({} items) in {}",
            manifest.name,
            store.table().len(),
            dir.display()
        );
        Ok(Self {
            config,
            manifest,
            manifest_path: manifest_path.to_path_buf(),
            store,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ContentStore {
        &mut self.store
    }

    /// Cache directory of this project.
    pub fn dir(&self) -> &Path {
        self.store.dir()
    }

    /// Write the path table back to the manifest.
    pub fn save(&mut self) -> Result<()> {
        self.manifest.media = self
            .store
            .table()
            .iter()
            .map(|item| MediaEntry {
                path: item.path.clone(),
                hash: item.hash.as_ref().map(ContentHash::to_string),
            })
            .collect();
        self.manifest.save(&self.manifest_path)
    }

    /// Drop every cached artifact and forget all media.
    pub async fn clear(&mut self) -> Result<()> {
        self.store.clear().await?;
        self.save()?;
        info!("Cleared project cache {}", self.dir().display());
        Ok(())
    }
}

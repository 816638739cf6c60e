//! Ingested media items and the path → identity table.
//!
//! The table is keyed by slot number and upserted by path: importing a file
//! at a path that is already known replaces that slot, whatever its content
//! hash was. Content identity lives in [`ContentHash`]; the table only records
//! which path currently points at which identity.

use crate::error::{AlignError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Hex SHA-1 digest of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    pub const LEN: usize = 40;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl FromStr for ContentHash {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() == Self::LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(AlignError::InvalidHash {
                value: s.to_string(),
            })
        }
    }
}

impl TryFrom<String> for ContentHash {
    type Error = AlignError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an ingested file is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Script,
}

impl MediaKind {
    /// Classify a file by extension. `None` means unsupported.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" | "mp3" | "flac" | "ogg" | "m4a" => Some(MediaKind::Audio),
            "json" => Some(MediaKind::Script),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Script => f.write_str("script"),
        }
    }
}

/// One ingested source file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub path: PathBuf,
    pub hash: Option<ContentHash>,
    pub kind: Option<MediaKind>,
    /// Whether the canonical artifact for this item exists in the store.
    pub hashed: bool,
}

impl MediaItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = MediaKind::from_path(&path);
        Self {
            path,
            hash: None,
            kind,
            hashed: false,
        }
    }

    pub fn with_hash(mut self, hash: ContentHash) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Hash of an item that is ready for downstream stages.
    pub fn usable_hash(&self) -> Option<&ContentHash> {
        if self.hashed { self.hash.as_ref() } else { None }
    }
}

/// Slot-ordered table of media items, upserted by path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaTable {
    slots: BTreeMap<usize, MediaItem>,
}

impl MediaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the item for `item.path`. Returns the slot used.
    pub fn upsert(&mut self, item: MediaItem) -> usize {
        let slot = self
            .slot_of(&item.path)
            .unwrap_or_else(|| self.slots.keys().next_back().map_or(0, |last| last + 1));
        self.slots.insert(slot, item);
        slot
    }

    pub fn slot_of(&self, path: &Path) -> Option<usize> {
        self.slots
            .iter()
            .find(|(_, item)| item.path == path)
            .map(|(slot, _)| *slot)
    }

    pub fn get(&self, slot: usize) -> Option<&MediaItem> {
        self.slots.get(&slot)
    }

    pub fn by_path(&self, path: &Path) -> Option<&MediaItem> {
        self.slot_of(path).and_then(|slot| self.slots.get(&slot))
    }

    /// Items in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.slots.values()
    }

    /// Usable hashes of one kind, in slot order, without duplicates.
    pub fn hashes_of(&self, kind: MediaKind) -> Vec<ContentHash> {
        let mut hashes: Vec<ContentHash> = Vec::new();
        for item in self.iter().filter(|item| item.kind == Some(kind)) {
            if let Some(hash) = item.usable_hash()
                && !hashes.contains(hash)
            {
                hashes.push(hash.clone());
            }
        }
        hashes
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

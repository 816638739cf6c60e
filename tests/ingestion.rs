//! Content-addressed ingestion and project persistence.

use async_trait::async_trait;
use dialign::config::{CacheConfig, Config};
use dialign::store::{ArtifactKind, identify};
use dialign::{AlignError, ContentStore, Engine, MediaKind, Session, Transcoder};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Copies the source and counts how often it was asked to.
#[derive(Default)]
struct CountingTranscoder {
    calls: AtomicUsize,
}

impl CountingTranscoder {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for CountingTranscoder {
    async fn normalize(&self, _kind: MediaKind, source: &Path, dest: &Path) -> dialign::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::copy(source, dest).await?;
        Ok(())
    }
}

struct BrokenTranscoder;

#[async_trait]
impl Transcoder for BrokenTranscoder {
    async fn normalize(&self, _kind: MediaKind, source: &Path, _dest: &Path) -> dialign::Result<()> {
        Err(AlignError::Transcode {
            path: source.display().to_string(),
            message: "cannot decode".to_string(),
        })
    }
}

#[tokio::test]
async fn reingesting_unchanged_file_hits_the_cache() {
    let cache = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let transcoder = Arc::new(CountingTranscoder::default());
    let mut store = ContentStore::open(cache.path(), transcoder.clone()).unwrap();

    let path = work.path().join("take.wav");
    std::fs::write(&path, b"RIFF take one").unwrap();

    let first = store.ingest(&path).await.unwrap();
    let second = store.ingest(&path).await.unwrap();

    assert!(first.hashed);
    assert_eq!(first.hash, second.hash);
    assert_eq!(transcoder.calls(), 1);
    assert_eq!(store.table().len(), 1);
}

#[tokio::test]
async fn identical_content_under_two_paths_shares_artifacts() {
    let cache = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let transcoder = Arc::new(CountingTranscoder::default());
    let mut store = ContentStore::open(cache.path(), transcoder.clone()).unwrap();

    let a = work.path().join("a.wav");
    let b = work.path().join("b.wav");
    std::fs::write(&a, b"same bytes").unwrap();
    std::fs::write(&b, b"same bytes").unwrap();

    let first = store.ingest(&a).await.unwrap();
    let second = store.ingest(&b).await.unwrap();

    assert_eq!(first.hash, second.hash);
    assert_eq!(transcoder.calls(), 1);
    assert_eq!(store.table().len(), 2);
    assert_eq!(store.table().hashes_of(MediaKind::Audio).len(), 1);
}

#[tokio::test]
async fn edited_file_gets_new_hash_in_same_slot() {
    let cache = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let transcoder = Arc::new(CountingTranscoder::default());
    let mut store = ContentStore::open(cache.path(), transcoder.clone()).unwrap();

    let path = work.path().join("take.wav");
    std::fs::write(&path, b"first cut").unwrap();
    let before = store.ingest(&path).await.unwrap();
    let slot = store.table().slot_of(&path);

    std::fs::write(&path, b"second cut").unwrap();
    let after = store.ingest(&path).await.unwrap();

    assert_ne!(before.hash, after.hash);
    assert_eq!(store.table().slot_of(&path), slot);
    assert_eq!(store.table().len(), 1);
    assert_eq!(transcoder.calls(), 2);
    assert_eq!(after.hash, Some(identify(&path).await.unwrap()));
}

#[tokio::test]
async fn unusable_files_are_recorded_but_not_hashed() {
    let cache = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let mut store = ContentStore::open(cache.path(), Arc::new(BrokenTranscoder)).unwrap();

    let notes = work.path().join("notes.txt");
    std::fs::write(&notes, b"call sheet").unwrap();
    let item = store.ingest(&notes).await.unwrap();
    assert!(item.kind.is_none());
    assert!(!item.hashed);

    let take = work.path().join("take.wav");
    std::fs::write(&take, b"not really audio").unwrap();
    let item = store.ingest(&take).await.unwrap();
    assert_eq!(item.kind, Some(MediaKind::Audio));
    assert!(!item.hashed);
    let hash = item.hash.unwrap();
    assert!(store.materialize(&hash, ArtifactKind::NormalizedAudio).is_none());
    assert!(store.table().hashes_of(MediaKind::Audio).is_empty());

    assert!(store.ingest(&work.path().join("missing.wav")).await.is_err());
}

#[tokio::test]
async fn reopened_project_remembers_imported_media() {
    let cache = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let manifest = work.path().join("dialign.toml");
    let config = Config {
        cache: CacheConfig {
            root: Some(cache.path().to_path_buf()),
        },
        ..Default::default()
    };
    let transcoder = Arc::new(CountingTranscoder::default());

    let take = work.path().join("take.wav");
    std::fs::write(&take, b"take bytes").unwrap();
    let hash = {
        let session = Session::open(config.clone(), &manifest, transcoder.clone()).unwrap();
        let mut engine = Engine::new(session);
        let report = engine.import(std::slice::from_ref(&take)).await.unwrap();
        assert!(report.failed.is_empty());
        report.items[0].hash.clone().unwrap()
    };

    let session = Session::open(config, &manifest, transcoder.clone()).unwrap();
    let item = session.store().table().by_path(&take).unwrap();
    assert_eq!(item.hash.as_ref(), Some(&hash));
    assert!(item.hashed);
    assert_eq!(transcoder.calls(), 1);
}

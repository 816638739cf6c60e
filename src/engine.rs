//! The alignment workflow over one session: import, transcribe, align,
//! export.

use crate::audio::wav::read_wav_file;
use crate::error::{AlignError, Result};
use crate::matching::aligner::LineAligner;
use crate::matching::resolver::SpeakerTrackResolver;
use crate::output::{OutputDocument, ScriptAlignment};
use crate::recognition::recognizer::Recognizer;
use crate::recognition::scheduler::{ProgressObserver, ScheduleReport, Scheduler};
use crate::recognition::segmenter::Segmenter;
use crate::recognition::transcript::Transcript;
use crate::script::ScriptDocument;
use crate::session::Session;
use crate::store::{ArtifactKind, ContentHash, MediaItem, MediaKind};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of an import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub items: Vec<MediaItem>,
    /// Files that could not be read at all.
    pub failed: Vec<(PathBuf, String)>,
}

impl ImportReport {
    /// Items that were recorded but produced no usable artifact.
    pub fn not_hashed(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter().filter(|item| !item.hashed)
    }
}

/// Per-track outcome of a transcription run.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Cached,
    Transcribed { words: usize, report: ScheduleReport },
    Failed(String),
}

#[derive(Debug, Default)]
pub struct TranscribeReport {
    pub tracks: Vec<(ContentHash, TrackOutcome)>,
}

/// Runs each stage against a [`Session`].
pub struct Engine {
    session: Session,
}

impl Engine {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Ingest files into the store and record them in the manifest.
    ///
    /// Recoverable per-file failures are logged and reported and the import
    /// carries on. Anything else stops it after saving what was imported.
    pub async fn import(&mut self, paths: &[PathBuf]) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for path in paths {
            match self.session.store_mut().ingest(path).await {
                Ok(item) => {
                    info!(
                        "Imported {} ({})",
                        path.display(),
                        item.hash.as_ref().map_or("-", |h| h.short())
                    );
                    report.items.push(item);
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Failed to import {}: {}", path.display(), e);
                    report.failed.push((path.clone(), e.to_string()));
                }
                Err(e) => {
                    self.session.save()?;
                    return Err(e);
                }
            }
        }
        self.session.save()?;
        Ok(report)
    }

    /// Recognize every imported audio track that has no cached transcript.
    ///
    /// With `force`, cached transcripts are recomputed. A track whose every
    /// segment failed is not cached so a later run retries it.
    ///
    /// # Errors
    /// Returns `BackendConfig` before any work if the recognizer is unusable.
    pub async fn transcribe(
        &self,
        recognizer: Arc<dyn Recognizer>,
        force: bool,
        observer: &dyn ProgressObserver,
    ) -> Result<TranscribeReport> {
        let config = self.session.config();
        let scheduler = Scheduler::new(recognizer, &config.recognition)?;
        let segmenter = Segmenter::new(config.segmentation.clone());
        let store = self.session.store();

        let mut report = TranscribeReport::default();
        for hash in store.table().hashes_of(MediaKind::Audio) {
            if !force && store.materialize(&hash, ArtifactKind::Recognition).is_some() {
                debug!("Transcript for {} is cached", hash.short());
                report.tracks.push((hash, TrackOutcome::Cached));
                continue;
            }

            let samples = match store
                .materialize(&hash, ArtifactKind::NormalizedAudio)
                .ok_or_else(|| AlignError::MissingArtifact {
                    hash: hash.to_string(),
                    kind: ArtifactKind::NormalizedAudio.to_string(),
                })
                .and_then(|path| read_wav_file(&path))
            {
                Ok(samples) => samples,
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping track {}: {}", hash.short(), e);
                    report.tracks.push((hash, TrackOutcome::Failed(e.to_string())));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let segments = segmenter.split(&samples);
            info!("Track {}: {} segments", hash.short(), segments.len());
            observer.track_started(hash.as_str(), segments.len());
            let (transcript, schedule) = scheduler.transcribe(segments, observer).await;
            observer.track_finished(hash.as_str(), transcript.len());

            if schedule.all_failed() {
                warn!("Every segment of {} failed; not caching", hash.short());
                report.tracks.push((
                    hash,
                    TrackOutcome::Failed("every segment failed".to_string()),
                ));
                continue;
            }
            if schedule.failed > 0 {
                warn!(
                    "Track {}: {} of {} segments failed",
                    hash.short(),
                    schedule.failed,
                    schedule.segments
                );
            }
            store
                .put_json(&hash, ArtifactKind::Recognition, &transcript)
                .await?;
            report.tracks.push((
                hash,
                TrackOutcome::Transcribed {
                    words: transcript.len(),
                    report: schedule,
                },
            ));
        }
        Ok(report)
    }

    /// Cached transcripts of all imported audio, in import order.
    pub async fn transcripts(&self) -> Result<Vec<(ContentHash, Transcript)>> {
        let store = self.session.store();
        let mut tracks = Vec::new();
        for hash in store.table().hashes_of(MediaKind::Audio) {
            match store
                .get_json::<Transcript>(&hash, ArtifactKind::Recognition)
                .await?
            {
                Some(transcript) => tracks.push((hash, transcript)),
                None => warn!("Track {} has not been transcribed", hash.short()),
            }
        }
        Ok(tracks)
    }

    /// Resolve speakers and align lines for one script, or for every
    /// imported script.
    ///
    /// # Errors
    /// `NotAScript` if `script` is not an imported script. Any resolution
    /// failure aborts the step. Alignments stored for earlier scripts stay
    /// valid.
    pub async fn align(
        &self,
        script: Option<&ContentHash>,
    ) -> Result<Vec<(ContentHash, ScriptAlignment)>> {
        let store = self.session.store();
        let imported = store.table().hashes_of(MediaKind::Script);
        let scripts = match script {
            Some(hash) if imported.contains(hash) => vec![hash.clone()],
            Some(hash) => {
                return Err(AlignError::NotAScript {
                    hash: hash.to_string(),
                });
            }
            None => imported,
        };
        if scripts.is_empty() {
            return Err(AlignError::Other("No script has been imported".to_string()));
        }

        let tracks = self.transcripts().await?;
        let config = self.session.config();
        let resolver = SpeakerTrackResolver::new(config.resolver.clone());
        let aligner = LineAligner::new(config.aligner.clone());

        let mut out = Vec::new();
        for hash in scripts {
            let path = store.materialize(&hash, ArtifactKind::Script).ok_or_else(|| {
                AlignError::MissingArtifact {
                    hash: hash.to_string(),
                    kind: ArtifactKind::Script.to_string(),
                }
            })?;
            let document = ScriptDocument::load(&path)?;
            info!(
                "Matching {} ({} speakers, {} lines) against {} tracks",
                document.title,
                document.speakers.len(),
                document.lines.len(),
                tracks.len()
            );

            let resolution = resolver.resolve(&document, &tracks)?;
            let result = aligner.align(&document, &resolution.map, &tracks);
            let alignment = ScriptAlignment::new(&document, &result);
            store
                .put_json(&hash, ArtifactKind::Alignment, &alignment)
                .await?;
            out.push((hash, alignment));
        }
        Ok(out)
    }

    /// Collect stored alignments into the output document.
    pub async fn export(&self) -> Result<OutputDocument> {
        let store = self.session.store();
        let mut doc = OutputDocument::new();
        for hash in store.table().hashes_of(MediaKind::Script) {
            match store
                .get_json::<ScriptAlignment>(&hash, ArtifactKind::Alignment)
                .await?
            {
                Some(alignment) => {
                    doc.insert(hash, alignment);
                }
                None => warn!("Script {} has not been matched", hash.short()),
            }
        }
        Ok(doc)
    }

    /// Drop the project cache.
    pub async fn clear(&mut self) -> Result<()> {
        self.session.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::encode_wav;
    use crate::config::{CacheConfig, Config};
    use crate::recognition::recognizer::MockRecognizer;
    use crate::recognition::scheduler::NoProgress;
    use crate::recognition::transcript::Word;
    use crate::store::Transcoder;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    struct CopyTranscoder;

    #[async_trait]
    impl Transcoder for CopyTranscoder {
        async fn normalize(&self, _kind: MediaKind, source: &Path, dest: &Path) -> Result<()> {
            tokio::fs::copy(source, dest).await?;
            Ok(())
        }
    }

    struct Fixture {
        _cache: TempDir,
        work: TempDir,
        engine: Engine,
    }

    fn fixture() -> Fixture {
        let cache = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let config = Config {
            cache: CacheConfig {
                root: Some(cache.path().to_path_buf()),
            },
            ..Default::default()
        };
        let session = Session::open(
            config,
            &work.path().join("dialign.toml"),
            Arc::new(CopyTranscoder),
        )
        .unwrap();
        Fixture {
            _cache: cache,
            work,
            engine: Engine::new(session),
        }
    }

    fn write_wav(dir: &Path, name: &str, ms: u64) -> PathBuf {
        let path = dir.join(name);
        let samples = vec![4000i16; (ms * 16) as usize];
        std::fs::write(&path, encode_wav(&samples).unwrap()).unwrap();
        path
    }

    fn write_script(dir: &Path) -> PathBuf {
        let path = dir.join("script.json");
        std::fs::write(
            &path,
            r#"{"title": "t", "scenes": [{"title": "one", "lines": [
                {"speaker": "ANNA", "text": "今天天气很好我们去公园散步"}
            ]}]}"#,
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_unready_backend_fails_before_work() {
        let fx = fixture();
        let recognizer = Arc::new(MockRecognizer::new("mock").unready());
        let result = fx.engine.transcribe(recognizer.clone(), false, &NoProgress).await;
        assert!(matches!(result, Err(AlignError::BackendConfig { .. })));
        assert_eq!(recognizer.calls(), 0);
    }

    #[tokio::test]
    async fn test_transcribe_caches_and_skips() {
        let mut fx = fixture();
        let wav = write_wav(fx.work.path(), "anna.wav", 2_000);
        fx.engine.import(&[wav]).await.unwrap();

        let recognizer = Arc::new(
            MockRecognizer::new("mock").with_segment(0, vec![Word::new("ni", 0, 100)]),
        );
        let first = fx
            .engine
            .transcribe(recognizer.clone(), false, &NoProgress)
            .await
            .unwrap();
        assert!(matches!(
            first.tracks[0].1,
            TrackOutcome::Transcribed { words: 1, .. }
        ));

        let second = fx
            .engine
            .transcribe(recognizer.clone(), false, &NoProgress)
            .await
            .unwrap();
        assert_eq!(second.tracks[0].1, TrackOutcome::Cached);
        assert_eq!(recognizer.calls(), 1);

        fx.engine
            .transcribe(recognizer.clone(), true, &NoProgress)
            .await
            .unwrap();
        assert_eq!(recognizer.calls(), 2);
    }

    #[tokio::test]
    async fn test_fully_failed_track_is_not_cached() {
        let mut fx = fixture();
        let wav = write_wav(fx.work.path(), "anna.wav", 2_000);
        fx.engine.import(&[wav]).await.unwrap();

        let recognizer = Arc::new(MockRecognizer::new("mock").failing_on(0));
        let report = fx
            .engine
            .transcribe(recognizer, false, &NoProgress)
            .await
            .unwrap();
        assert!(matches!(report.tracks[0].1, TrackOutcome::Failed(_)));
        assert!(fx.engine.transcripts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_align_without_script_is_error() {
        let fx = fixture();
        assert!(fx.engine.align(None).await.is_err());
    }

    #[tokio::test]
    async fn test_full_workflow_exports_matches() {
        let mut fx = fixture();
        let wav = write_wav(fx.work.path(), "anna.wav", 2_000);
        let script = write_script(fx.work.path());
        let report = fx.engine.import(&[wav, script]).await.unwrap();
        assert_eq!(report.items.len(), 2);
        assert_eq!(report.not_hashed().count(), 0);

        let words: Vec<Word> = "今 天 天 气 很 好 我 们 去 公 园 散 步"
            .split_whitespace()
            .enumerate()
            .map(|(i, w)| Word::new(w, i as u64 * 100, i as u64 * 100 + 90))
            .collect();
        let recognizer = Arc::new(MockRecognizer::new("mock").with_segment(0, words));
        fx.engine
            .transcribe(recognizer, false, &NoProgress)
            .await
            .unwrap();

        let aligned = fx.engine.align(None).await.unwrap();
        assert_eq!(aligned.len(), 1);
        let line = &aligned[0].1.lines[0];
        let matched = line.matched.as_ref().unwrap();
        assert_eq!((matched.start_ms, matched.end_ms), (0, 1_290));

        let exported = fx.engine.export().await.unwrap();
        assert_eq!(exported.get(&aligned[0].0), Some(&aligned[0].1));
    }

    #[tokio::test]
    async fn test_align_rejects_hash_that_is_not_a_script() {
        let mut fx = fixture();
        let wav = write_wav(fx.work.path(), "anna.wav", 2_000);
        let script = write_script(fx.work.path());
        let report = fx.engine.import(&[wav, script]).await.unwrap();
        let audio = report.items[0].hash.clone().unwrap();
        let recognizer = Arc::new(
            MockRecognizer::new("mock").with_segment(0, vec![Word::new("今天", 0, 100)]),
        );
        fx.engine
            .transcribe(recognizer, false, &NoProgress)
            .await
            .unwrap();

        let result = fx.engine.align(Some(&audio)).await;
        assert!(matches!(result, Err(AlignError::NotAScript { .. })));
        let store = fx.engine.session().store();
        assert!(store.materialize(&audio, ArtifactKind::Alignment).is_none());

        let unknown: ContentHash = "c".repeat(40).parse().unwrap();
        assert!(matches!(
            fx.engine.align(Some(&unknown)).await,
            Err(AlignError::NotAScript { .. })
        ));
    }

    #[tokio::test]
    async fn test_import_stops_on_cache_failure() {
        struct FullDiskTranscoder;

        #[async_trait]
        impl Transcoder for FullDiskTranscoder {
            async fn normalize(&self, _kind: MediaKind, _source: &Path, _dest: &Path) -> Result<()> {
                Err(std::io::Error::other("no space left on device").into())
            }
        }

        let cache = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let config = Config {
            cache: CacheConfig {
                root: Some(cache.path().to_path_buf()),
            },
            ..Default::default()
        };
        let manifest = work.path().join("dialign.toml");
        let session = Session::open(config, &manifest, Arc::new(FullDiskTranscoder)).unwrap();
        let mut engine = Engine::new(session);

        let notes = work.path().join("notes.txt");
        std::fs::write(&notes, b"call sheet").unwrap();
        let missing = work.path().join("missing.wav");
        let wav = write_wav(work.path(), "anna.wav", 1_000);

        let result = engine.import(&[notes.clone(), missing, wav]).await;
        assert!(matches!(result, Err(AlignError::Io(_))));
        // Items before the failure are kept in the manifest
        let saved = crate::session::Manifest::load(&manifest).unwrap();
        assert_eq!(saved.media.len(), 1);
        assert_eq!(saved.media[0].path, notes);
    }

    #[tokio::test]
    async fn test_import_reports_unreadable_file() {
        let mut fx = fixture();
        let missing = fx.work.path().join("missing.wav");
        let report = fx.engine.import(&[missing.clone()]).await.unwrap();
        assert!(report.items.is_empty());
        assert_eq!(report.failed[0].0, missing);
    }
}

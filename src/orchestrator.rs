//! Pipeline orchestrator for Shadowify.
//!
//! Coordinates one ingestion from a user-supplied reference to a stored video
//! with classified segments, and serves the read side of the catalogue and
//! transcription of learners' own recordings.

use crate::audio::YtDlpFetcher;
use crate::audio_source::{normalize_reference, FetchedMedia, MediaFetcher, TempAudioFile};
use crate::background::BackgroundJobs;
use crate::config::Settings;
use crate::difficulty::{aggregate_level, DifficultyClassifier, HttpDifficultyClassifier};
use crate::error::{Result, ShadowifyError};
use crate::store::{NewSegment, NewVideo, Page, Pagination, Segment, SqliteVideoStore, Video, VideoFilter, VideoStore};
use crate::transcription::{SpeechRecognizer, WhisperCli};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Progress of a single ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Normalized,
    DuplicateChecked,
    Fetched,
    LanguageGated,
    Transcribed,
    Classified,
    Persisted,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "start",
            Stage::Normalized => "normalized",
            Stage::DuplicateChecked => "duplicate_checked",
            Stage::Fetched => "fetched",
            Stage::LanguageGated => "language_gated",
            Stage::Transcribed => "transcribed",
            Stage::Classified => "classified",
            Stage::Persisted => "persisted",
            Stage::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub video_id: String,
    pub youtube_id: String,
    pub title: String,
    pub segment_count: usize,
    pub difficulty: Option<String>,
}

/// Plain-text transcript of a learner recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingTranscript {
    pub text: String,
    /// CEFR level of the whole text, when grading was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cefr: Option<String>,
}

/// The main orchestrator for the Shadowify pipeline.
pub struct Orchestrator {
    fetcher: Arc<dyn MediaFetcher>,
    recognizer: Arc<dyn SpeechRecognizer>,
    classifier: Arc<dyn DifficultyClassifier>,
    store: Arc<dyn VideoStore>,
    jobs: BackgroundJobs,
    supported_language: String,
    timeout: Option<Duration>,
    temp_dir: PathBuf,
}

impl Orchestrator {
    /// Create an orchestrator wired to yt-dlp, whisper-cli, the HTTP
    /// classifier and the SQLite store from `settings`.
    pub fn new(settings: &Settings) -> Result<Self> {
        let temp_dir = settings.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        let fetcher = Arc::new(YtDlpFetcher::new(&settings.downloader, temp_dir));
        let recognizer = Arc::new(WhisperCli::new(&settings.whisper));
        let classifier = Arc::new(HttpDifficultyClassifier::new(&settings.classifier)?);
        let store = Arc::new(SqliteVideoStore::new(&settings.sqlite_path())?);

        Ok(Self::with_components(settings, fetcher, recognizer, classifier, store))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: &Settings,
        fetcher: Arc<dyn MediaFetcher>,
        recognizer: Arc<dyn SpeechRecognizer>,
        classifier: Arc<dyn DifficultyClassifier>,
        store: Arc<dyn VideoStore>,
    ) -> Self {
        let timeout = match settings.pipeline.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            fetcher,
            recognizer,
            classifier,
            store,
            jobs: BackgroundJobs::new(),
            supported_language: settings.language.supported.trim().to_lowercase(),
            timeout,
            temp_dir: settings.temp_dir(),
        }
    }

    /// Override the ingestion time limit.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> Arc<dyn VideoStore> {
        self.store.clone()
    }

    pub fn jobs(&self) -> &BackgroundJobs {
        &self.jobs
    }

    /// Run the full pipeline for one reference.
    ///
    /// Nothing is stored unless every stage succeeds. The downloaded audio
    /// is removed whether or not the run succeeds.
    #[instrument(skip(self), fields(input = %input))]
    pub async fn ingest(&self, input: &str) -> Result<IngestOutcome> {
        let mut stage = Stage::Start;

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run(input, &mut stage)).await {
                Ok(result) => result,
                Err(_) => Err(ShadowifyError::Timeout(limit.as_secs())),
            },
            None => self.run(input, &mut stage).await,
        };

        match &result {
            Ok(outcome) => info!(
                "Ingested {} as {} ({} segments)",
                outcome.youtube_id, outcome.video_id, outcome.segment_count
            ),
            Err(e) => warn!("Ingestion aborted after stage '{}': {}", stage, e),
        }

        result
    }

    async fn run(&self, input: &str, stage: &mut Stage) -> Result<IngestOutcome> {
        let youtube_id = normalize_reference(input)?;
        advance(stage, Stage::Normalized);

        self.check_existing(&youtube_id).await?;
        advance(stage, Stage::DuplicateChecked);

        let FetchedMedia { metadata, audio } = self.fetcher.fetch(&youtube_id).await?;
        advance(stage, Stage::Fetched);

        let detected = self.recognizer.detect_language(audio.path()).await?;
        if !detected.eq_ignore_ascii_case(&self.supported_language) {
            return Err(ShadowifyError::UnsupportedLanguage {
                detected,
                supported: self.supported_language.clone(),
            });
        }
        advance(stage, Stage::LanguageGated);

        let transcript = self.recognizer.transcribe(audio.path()).await?;
        advance(stage, Stage::Transcribed);

        let texts = transcript.texts();
        let labels = self.classifier.classify(&texts).await?;
        if labels.len() != texts.len() {
            return Err(ShadowifyError::Classification(format!(
                "expected {} labels, got {}",
                texts.len(),
                labels.len()
            )));
        }
        advance(stage, Stage::Classified);

        let mut video = NewVideo::from_metadata(&youtube_id, &metadata);
        video.difficulty = aggregate_level(labels.as_slice()).map(|level| level.to_string());

        let segments: Vec<NewSegment> = transcript
            .segments
            .into_iter()
            .zip(labels)
            .map(|(segment, label)| NewSegment {
                start_sec: segment.start_seconds,
                end_sec: segment.end_seconds,
                content: segment.text,
                difficulty: Some(label),
            })
            .collect();

        let persisted = self.store.create_with_segments(&video, &segments).await;
        audio.remove();
        let video_id = persisted?;
        advance(stage, Stage::Persisted);

        let outcome = IngestOutcome {
            video_id,
            youtube_id,
            title: video.title,
            segment_count: segments.len(),
            difficulty: video.difficulty,
        };
        advance(stage, Stage::Done);
        Ok(outcome)
    }

    /// Refuse ids that are already stored.
    async fn check_existing(&self, youtube_id: &str) -> Result<()> {
        match self.store.find_by_youtube_id(youtube_id).await {
            Ok(Some(existing)) => {
                debug!("{} already stored as {}", youtube_id, existing.id);
                Err(ShadowifyError::AlreadyExists(youtube_id.to_string()))
            }
            Ok(None) => Ok(()),
            Err(e) => Err(ShadowifyError::Internal(format!("duplicate check failed: {}", e))),
        }
    }

    /// Transcribe a learner's own recording, grading it when `evaluate` is set.
    ///
    /// The audio is written to a directory of its own under the temp directory
    /// and removed before returning. It must be in a format whisper-cli reads.
    #[instrument(skip(self, audio), fields(bytes = audio.len()))]
    pub async fn transcribe_recording(&self, audio: &[u8], evaluate: bool) -> Result<RecordingTranscript> {
        if audio.is_empty() {
            return Err(ShadowifyError::InvalidAudio("recording is empty".to_string()));
        }

        let recording = self.write_recording(audio).await?;
        let text = self.recognizer.transcribe_text(recording.path()).await;
        recording.remove();
        let text = text?;

        let cefr = if evaluate && !text.is_empty() {
            let labels = self.classifier.classify(std::slice::from_ref(&text)).await?;
            match labels.as_slice() {
                [label] => Some(label.clone()),
                other => {
                    return Err(ShadowifyError::Classification(format!(
                        "expected 1 label, got {}",
                        other.len()
                    )))
                }
            }
        } else {
            None
        };

        debug!("Transcribed recording ({} chars, cefr {:?})", text.len(), cefr);
        Ok(RecordingTranscript { text, cefr })
    }

    async fn write_recording(&self, audio: &[u8]) -> Result<TempAudioFile> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let run_dir = tempfile::Builder::new()
            .prefix("recording-")
            .tempdir_in(&self.temp_dir)?;
        let path = run_dir.path().join("recording.wav");
        tokio::fs::write(&path, audio).await?;
        Ok(TempAudioFile::new(run_dir, path))
    }

    /// Read a video and count the view in the background.
    #[instrument(skip(self))]
    pub async fn get_video(&self, id: &str) -> Result<Video> {
        let video = self
            .store
            .get_video(id)
            .await?
            .ok_or_else(|| ShadowifyError::NotFound(format!("video {}", id)))?;

        let store = self.store.clone();
        let video_id = video.id.clone();
        self.jobs.submit("increment_view_count", async move {
            match store.increment_view_count(&video_id).await? {
                true => Ok(()),
                false => Err(ShadowifyError::NotFound(format!("video {}", video_id))),
            }
        });

        Ok(video)
    }

    pub async fn list_videos(&self, filter: &VideoFilter, pagination: Pagination) -> Result<Page<Video>> {
        self.store.list_videos(filter, pagination).await
    }

    pub async fn categories(&self) -> Result<Vec<String>> {
        self.store.categories().await
    }

    /// Segments of an existing video, ordered by start time.
    pub async fn segments(&self, video_id: &str) -> Result<Vec<Segment>> {
        if self.store.get_video(video_id).await?.is_none() {
            return Err(ShadowifyError::NotFound(format!("video {}", video_id)));
        }
        self.store.segments_for_video(video_id).await
    }

    pub async fn segment(&self, id: &str) -> Result<Segment> {
        self.store
            .get_segment(id)
            .await?
            .ok_or_else(|| ShadowifyError::NotFound(format!("segment {}", id)))
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    info!("Stage {} -> {}", stage, next);
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_source::YoutubeMetadata;
    use crate::transcription::{Transcript, TranscriptSegment};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    /// Hands out a fresh audio file per call and remembers every path it issued.
    struct FakeFetcher {
        dir: TempDir,
        calls: AtomicUsize,
        issued: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    impl FakeFetcher {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                calls: AtomicUsize::new(0),
                issued: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        /// Issued audio files that still exist.
        fn leftovers(&self) -> usize {
            self.issued.lock().unwrap().iter().filter(|p| p.exists()).count()
        }
    }

    #[async_trait]
    impl MediaFetcher for FakeFetcher {
        async fn fetch(&self, youtube_id: &str) -> Result<FetchedMedia> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ShadowifyError::Fetch("exit status: 1".into()));
            }

            let run_dir = tempfile::Builder::new()
                .prefix(&format!("run-{}-", n))
                .tempdir_in(self.dir.path())?;
            let path = run_dir.path().join("audio.wav");
            std::fs::write(&path, b"RIFF")?;
            self.issued.lock().unwrap().push(path.clone());

            Ok(FetchedMedia {
                metadata: YoutubeMetadata {
                    id: youtube_id.to_string(),
                    title: "T".into(),
                    full_title: "T".into(),
                    duration: 5,
                    categories: vec!["Education".into()],
                    ..Default::default()
                },
                audio: TempAudioFile::new(run_dir, path),
            })
        }
    }

    struct FakeRecognizer {
        language: String,
        segments: Vec<TranscriptSegment>,
        recording_text: String,
        transcribe_calls: AtomicUsize,
        detect_delay: Option<Duration>,
    }

    impl FakeRecognizer {
        fn speaking(language: &str) -> Self {
            Self {
                language: language.to_string(),
                segments: vec![
                    TranscriptSegment::new(0.0, 2.5, "hello"),
                    TranscriptSegment::new(2.5, 5.0, "world"),
                ],
                recording_text: "I would like a coffee.".to_string(),
                transcribe_calls: AtomicUsize::new(0),
                detect_delay: None,
            }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for FakeRecognizer {
        async fn detect_language(&self, audio_path: &Path) -> Result<String> {
            assert!(audio_path.exists());
            if let Some(delay) = self.detect_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.language.clone())
        }

        async fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
            assert!(audio_path.exists());
            self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Transcript::new(self.segments.clone()))
        }

        async fn transcribe_text(&self, audio_path: &Path) -> Result<String> {
            assert_eq!(std::fs::read(audio_path)?, b"RIFF".to_vec());
            Ok(self.recording_text.clone())
        }
    }

    struct FakeClassifier {
        labels: Vec<String>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl FakeClassifier {
        fn returning(labels: &[&str]) -> Self {
            Self {
                labels: labels.iter().map(|l| l.to_string()).collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DifficultyClassifier for FakeClassifier {
        async fn classify(&self, texts: &[String]) -> Result<Vec<String>> {
            self.seen.lock().unwrap().push(texts.to_vec());
            Ok(self.labels.clone())
        }
    }

    /// SQLite store that counts writes and can hide existing rows from the duplicate check.
    struct CountingStore {
        inner: SqliteVideoStore,
        creates: AtomicUsize,
        blind_lookup: bool,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: SqliteVideoStore::in_memory().unwrap(),
                creates: AtomicUsize::new(0),
                blind_lookup: false,
            }
        }
    }

    #[async_trait]
    impl VideoStore for CountingStore {
        async fn find_by_youtube_id(&self, youtube_id: &str) -> Result<Option<Video>> {
            if self.blind_lookup {
                return Ok(None);
            }
            self.inner.find_by_youtube_id(youtube_id).await
        }

        async fn create_with_segments(&self, video: &NewVideo, segments: &[NewSegment]) -> Result<String> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create_with_segments(video, segments).await
        }

        async fn get_video(&self, id: &str) -> Result<Option<Video>> {
            self.inner.get_video(id).await
        }

        async fn increment_view_count(&self, id: &str) -> Result<bool> {
            self.inner.increment_view_count(id).await
        }

        async fn list_videos(&self, filter: &VideoFilter, pagination: Pagination) -> Result<Page<Video>> {
            self.inner.list_videos(filter, pagination).await
        }

        async fn categories(&self) -> Result<Vec<String>> {
            self.inner.categories().await
        }

        async fn segments_for_video(&self, video_id: &str) -> Result<Vec<Segment>> {
            self.inner.segments_for_video(video_id).await
        }

        async fn get_segment(&self, id: &str) -> Result<Option<Segment>> {
            self.inner.get_segment(id).await
        }
    }

    struct Harness {
        fetcher: Arc<FakeFetcher>,
        recognizer: Arc<FakeRecognizer>,
        classifier: Arc<FakeClassifier>,
        store: Arc<CountingStore>,
        scratch: TempDir,
    }

    impl Harness {
        fn new(recognizer: FakeRecognizer, classifier: FakeClassifier) -> Self {
            Self {
                fetcher: Arc::new(FakeFetcher::new()),
                recognizer: Arc::new(recognizer),
                classifier: Arc::new(classifier),
                store: Arc::new(CountingStore::new()),
                scratch: tempfile::tempdir().unwrap(),
            }
        }

        fn english() -> Self {
            Self::new(FakeRecognizer::speaking("en"), FakeClassifier::returning(&["A1", "A2"]))
        }

        fn orchestrator(&self) -> Orchestrator {
            let mut settings = Settings::default();
            settings.general.temp_dir = self.scratch.path().to_string_lossy().into_owned();

            Orchestrator::with_components(
                &settings,
                self.fetcher.clone(),
                self.recognizer.clone(),
                self.classifier.clone(),
                self.store.clone(),
            )
        }

        fn scratch_entries(&self) -> usize {
            std::fs::read_dir(self.scratch.path()).unwrap().count()
        }
    }

    #[tokio::test]
    async fn test_end_to_end_ingest() {
        let harness = Harness::english();
        let orchestrator = harness.orchestrator();

        let outcome = assert_ok!(orchestrator.ingest("https://www.youtube.com/watch?v=abc123").await);

        assert_eq!(outcome.youtube_id, "abc123");
        assert_eq!(outcome.title, "T");
        assert_eq!(outcome.segment_count, 2);
        assert_eq!(outcome.difficulty.as_deref(), Some("A1"));

        let video = assert_ok!(orchestrator.get_video(&outcome.video_id).await);
        assert_eq!(video.youtube_id, "abc123");
        assert_eq!(video.duration_string, "00:05");

        let segments = assert_ok!(orchestrator.segments(&outcome.video_id).await);
        let pairs: Vec<(f64, f64, &str, Option<&str>)> = segments
            .iter()
            .map(|s| (s.start_sec, s.end_sec, s.content.as_str(), s.difficulty.as_deref()))
            .collect();
        assert_eq!(
            pairs,
            vec![(0.0, 2.5, "hello", Some("A1")), (2.5, 5.0, "world", Some("A2"))]
        );

        assert_eq!(
            *harness.classifier.seen.lock().unwrap(),
            vec![vec!["hello".to_string(), "world".to_string()]]
        );
        assert_eq!(harness.fetcher.leftovers(), 0);
    }

    #[tokio::test]
    async fn test_invalid_reference_touches_nothing() {
        let harness = Harness::english();
        let orchestrator = harness.orchestrator();

        for raw in ["   ", "../victim"] {
            let err = assert_err!(orchestrator.ingest(raw).await);
            assert!(matches!(err, ShadowifyError::InvalidReference(_)));
        }
        assert_eq!(harness.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_existing_video_skips_fetch() {
        let harness = Harness::english();
        let orchestrator = harness.orchestrator();
        assert_ok!(orchestrator.ingest("abc123").await);

        let err = assert_err!(orchestrator.ingest("https://youtu.be/abc123").await);

        assert!(matches!(err, ShadowifyError::AlreadyExists(ref id) if id == "abc123"));
        assert_eq!(harness.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_storage_constraint_reports_already_exists() {
        let mut harness = Harness::english();
        harness.store = Arc::new(CountingStore {
            blind_lookup: true,
            ..CountingStore::new()
        });
        let orchestrator = harness.orchestrator();

        assert_ok!(orchestrator.ingest("abc123").await);
        let err = assert_err!(orchestrator.ingest("abc123").await);

        assert!(matches!(err, ShadowifyError::AlreadyExists(_)));
        assert_eq!(harness.fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(harness.fetcher.leftovers(), 0);

        let page = assert_ok!(
            orchestrator
                .list_videos(&VideoFilter::default(), Pagination::default())
                .await
        );
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_concurrent_ingests_of_one_video_store_it_once() {
        let mut recognizer = FakeRecognizer::speaking("en");
        recognizer.detect_delay = Some(Duration::from_millis(20));
        let harness = Harness::new(recognizer, FakeClassifier::returning(&["A1", "A2"]));
        let orchestrator = harness.orchestrator();

        let (a, b) = tokio::join!(
            orchestrator.ingest("abc123"),
            orchestrator.ingest("https://youtu.be/abc123")
        );

        let rejected = match (a, b) {
            (Ok(_), Err(e)) | (Err(e), Ok(_)) => e,
            other => panic!("expected one success and one rejection, got {other:?}"),
        };
        assert!(matches!(rejected, ShadowifyError::AlreadyExists(ref id) if id == "abc123"));

        // Both runs passed the lookup, so the storage constraint decided
        assert_eq!(harness.fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(harness.store.creates.load(Ordering::SeqCst), 2);
        assert_eq!(harness.fetcher.leftovers(), 0);

        let page = assert_ok!(
            orchestrator
                .list_videos(&VideoFilter::default(), Pagination::default())
                .await
        );
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_unsupported_language_stops_before_transcription() {
        let harness = Harness::new(FakeRecognizer::speaking("ja"), FakeClassifier::returning(&["A1", "A2"]));
        let err = assert_err!(harness.orchestrator().ingest("abc123").await);

        match err {
            ShadowifyError::UnsupportedLanguage { detected, supported } => {
                assert_eq!(detected, "ja");
                assert_eq!(supported, "en");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(harness.recognizer.transcribe_calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.store.creates.load(Ordering::SeqCst), 0);
        assert_eq!(harness.fetcher.leftovers(), 0);
    }

    #[tokio::test]
    async fn test_language_match_is_case_insensitive() {
        let harness = Harness::new(FakeRecognizer::speaking("EN"), FakeClassifier::returning(&["B1", "B2"]));
        let outcome = assert_ok!(harness.orchestrator().ingest("abc123").await);
        assert_eq!(outcome.difficulty.as_deref(), Some("B1"));
    }

    #[tokio::test]
    async fn test_label_count_mismatch_persists_nothing() {
        let harness = Harness::new(FakeRecognizer::speaking("en"), FakeClassifier::returning(&["A1"]));
        let orchestrator = harness.orchestrator();

        let err = assert_err!(orchestrator.ingest("abc123").await);

        assert!(matches!(err, ShadowifyError::Classification(_)));
        assert_eq!(err.code(), "video.create.error");
        assert_eq!(harness.store.creates.load(Ordering::SeqCst), 0);
        assert!(assert_ok!(harness.store.find_by_youtube_id("abc123").await).is_none());
        assert_eq!(harness.fetcher.leftovers(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let mut harness = Harness::english();
        harness.fetcher = Arc::new(FakeFetcher {
            fail: true,
            ..FakeFetcher::new()
        });

        let err = assert_err!(harness.orchestrator().ingest("abc123").await);
        assert!(matches!(err, ShadowifyError::Fetch(_)));
        assert!(err.is_retryable());
        assert_eq!(harness.recognizer.transcribe_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_transcript_stores_video_without_segments() {
        let mut recognizer = FakeRecognizer::speaking("en");
        recognizer.segments.clear();
        let harness = Harness::new(recognizer, FakeClassifier::returning(&[]));
        let orchestrator = harness.orchestrator();

        let outcome = assert_ok!(orchestrator.ingest("abc123").await);

        assert_eq!(outcome.segment_count, 0);
        assert!(outcome.difficulty.is_none());
        assert!(assert_ok!(orchestrator.segments(&outcome.video_id).await).is_empty());
    }

    #[tokio::test]
    async fn test_timeout_cleans_up_audio() {
        let mut recognizer = FakeRecognizer::speaking("en");
        recognizer.detect_delay = Some(Duration::from_secs(30));
        let harness = Harness::new(recognizer, FakeClassifier::returning(&["A1", "A2"]));
        let orchestrator = harness
            .orchestrator()
            .with_timeout(Some(Duration::from_millis(50)));

        let err = assert_err!(orchestrator.ingest("abc123").await);

        assert!(matches!(err, ShadowifyError::Timeout(_)));
        assert_eq!(harness.store.creates.load(Ordering::SeqCst), 0);
        assert_eq!(harness.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.fetcher.leftovers(), 0);
    }

    #[tokio::test]
    async fn test_get_video_counts_view_in_background() {
        let harness = Harness::english();
        let orchestrator = harness.orchestrator();
        let outcome = assert_ok!(orchestrator.ingest("abc123").await);

        let first = assert_ok!(orchestrator.get_video(&outcome.video_id).await);
        assert_eq!(first.view_count, 0);
        orchestrator.jobs().wait_idle().await;

        let stored = harness.store.get_video(&outcome.video_id).await.unwrap().unwrap();
        assert_eq!(stored.view_count, 1);
    }

    #[tokio::test]
    async fn test_missing_reads_are_not_found() {
        let orchestrator = Harness::english().orchestrator();

        assert!(matches!(
            orchestrator.get_video("missing").await,
            Err(ShadowifyError::NotFound(_))
        ));
        assert!(matches!(
            orchestrator.segments("missing").await,
            Err(ShadowifyError::NotFound(_))
        ));
        assert!(matches!(
            orchestrator.segment("missing").await,
            Err(ShadowifyError::NotFound(_))
        ));
        assert_eq!(orchestrator.jobs().pending(), 0);
    }

    #[tokio::test]
    async fn test_recording_is_transcribed_and_graded() {
        let harness = Harness::new(FakeRecognizer::speaking("en"), FakeClassifier::returning(&["A2"]));
        let orchestrator = harness.orchestrator();

        let result = assert_ok!(orchestrator.transcribe_recording(b"RIFF", true).await);

        assert_eq!(
            result,
            RecordingTranscript {
                text: "I would like a coffee.".to_string(),
                cefr: Some("A2".to_string()),
            }
        );
        assert_eq!(
            *harness.classifier.seen.lock().unwrap(),
            vec![vec!["I would like a coffee.".to_string()]]
        );
        assert_eq!(harness.scratch_entries(), 0);
    }

    #[tokio::test]
    async fn test_recording_without_grading_skips_classifier() {
        let harness = Harness::english();
        let result = assert_ok!(harness.orchestrator().transcribe_recording(b"RIFF", false).await);

        assert!(result.cefr.is_none());
        assert!(harness.classifier.seen.lock().unwrap().is_empty());
        assert_eq!(harness.store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recording_failures() {
        let harness = Harness::english();
        let orchestrator = harness.orchestrator();

        let err = assert_err!(orchestrator.transcribe_recording(b"", true).await);
        assert!(matches!(err, ShadowifyError::InvalidAudio(_)));

        // Two labels for one text
        let err = assert_err!(orchestrator.transcribe_recording(b"RIFF", true).await);
        assert!(matches!(err, ShadowifyError::Classification(_)));
        assert_eq!(harness.scratch_entries(), 0);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::LanguageGated.to_string(), "language_gated");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}

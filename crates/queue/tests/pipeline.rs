#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    linkdrop_common::ChatType,
    linkdrop_config::SitePolicy,
    linkdrop_queue::{
        AdmissionFilter, AdmissionService, ConcurrencyLimit, ConvertError, Dispatcher,
        DownloadTarget, ExtractError, Extractor, Job, JobHandler, MediaKind, MessageRef,
        PipelineError, PipelineRunner, PipelineSettings, Probe, QueueStore, ReplyTarget,
        RequesterId, ResultNotifier, Stage, Transcoder, Transport, TransportError, WorkerPool,
    },
    tempfile::TempDir,
};

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FakeExtractor {
    duration_secs: Option<f64>,
    available: bool,
    /// Extension of the "downloaded" file.
    extension: &'static str,
    fail_fetch: Option<&'static str>,
    fetches: AtomicUsize,
}

impl Default for FakeExtractor {
    fn default() -> Self {
        Self {
            duration_secs: Some(42.0),
            available: true,
            extension: "mp4",
            fail_fetch: None,
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn probe(&self, _url: &str) -> Result<Probe, ExtractError> {
        Ok(Probe {
            duration_secs: self.duration_secs,
            available: self.available,
        })
    }

    async fn fetch(
        &self,
        _url: &str,
        _kind: MediaKind,
        target: &DownloadTarget,
    ) -> Result<PathBuf, ExtractError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        // Leave an intermediate behind the way yt-dlp does with split formats.
        let part = target.dir().join(format!("{}.f137.{}.part", target.stem(), self.extension));
        std::fs::write(&part, b"partial").unwrap();
        if let Some(message) = self.fail_fetch {
            return Err(ExtractError::new(message));
        }
        let out = target.dir().join(format!("{}.{}", target.stem(), self.extension));
        std::fs::write(&out, b"media").unwrap();
        Ok(out)
    }
}

#[derive(Default)]
struct FakeTranscoder {
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn convert(&self, _input: &Path, output: &Path) -> Result<(), ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(output, b"half-written").unwrap();
        if self.fail {
            return Err(ConvertError::new("ffmpeg exited with status 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Text(String, String),
    Video(String, PathBuf),
    Audio(String, PathBuf),
    Delete(String, String),
}

#[derive(Default)]
struct FakeTransport {
    calls: Mutex<Vec<Call>>,
    fail_upload: bool,
    next_id: AtomicU64,
}

impl FakeTransport {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: Call) -> MessageRef {
        self.calls.lock().unwrap().push(call);
        MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst).to_string())
    }

    /// Terminal notifications (deliveries and error texts) per chat.
    fn terminal_for(&self, chat_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| match c {
                Call::Video(chat, _) | Call::Audio(chat, _) => chat == chat_id,
                Call::Text(chat, text) => chat == chat_id && text.starts_with('❌'),
                Call::Delete(..) => false,
            })
            .count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_text(&self, to: &ReplyTarget, text: &str) -> Result<MessageRef, TransportError> {
        Ok(self.push(Call::Text(to.chat_id.clone(), text.to_string())))
    }

    async fn send_video_file(
        &self,
        to: &ReplyTarget,
        path: &Path,
        _caption: &str,
    ) -> Result<MessageRef, TransportError> {
        assert!(path.exists(), "delivered file must exist at upload time");
        if self.fail_upload {
            return Err(TransportError::new("Request Entity Too Large"));
        }
        Ok(self.push(Call::Video(to.chat_id.clone(), path.to_path_buf())))
    }

    async fn send_audio_file(
        &self,
        to: &ReplyTarget,
        path: &Path,
        _caption: &str,
    ) -> Result<MessageRef, TransportError> {
        assert!(path.exists(), "delivered file must exist at upload time");
        if self.fail_upload {
            return Err(TransportError::new("Request Entity Too Large"));
        }
        Ok(self.push(Call::Audio(to.chat_id.clone(), path.to_path_buf())))
    }

    async fn delete_message(
        &self,
        to: &ReplyTarget,
        message: &MessageRef,
    ) -> Result<(), TransportError> {
        self.push(Call::Delete(to.chat_id.clone(), message.0.clone()));
        Ok(())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

struct Harness {
    tmp: TempDir,
    extractor: Arc<FakeExtractor>,
    transcoder: Arc<FakeTranscoder>,
    transport: Arc<FakeTransport>,
    runner: PipelineRunner,
}

fn harness(extractor: FakeExtractor, transcoder: FakeTranscoder, transport: FakeTransport) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let extractor = Arc::new(extractor);
    let transcoder = Arc::new(transcoder);
    let transport = Arc::new(transport);
    let runner = PipelineRunner::new(
        extractor.clone(),
        transcoder.clone(),
        ResultNotifier::new(transport.clone()),
        PipelineSettings {
            tmp_dir: tmp.path().to_path_buf(),
            max_video_duration_secs: 360,
            video_container: "mp4".into(),
        },
    );
    Harness {
        tmp,
        extractor,
        transcoder,
        transport,
        runner,
    }
}

impl Harness {
    fn leftover_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.tmp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

fn reply(chat_id: &str, chat_type: ChatType) -> ReplyTarget {
    ReplyTarget {
        chat_id: chat_id.into(),
        message_id: Some("1".into()),
        chat_type,
    }
}

fn job(requester: &str, kind: MediaKind) -> Job {
    Job::new(
        RequesterId::from(requester),
        "https://video-site.example/clip",
        kind,
        reply(requester, ChatType::Dm),
        None,
    )
}

// ── Pipeline properties ──────────────────────────────────────────────────────

#[tokio::test]
async fn video_happy_path_delivers_once_and_cleans_up() {
    let h = harness(FakeExtractor::default(), FakeTranscoder::default(), FakeTransport::default());

    let report = h.runner.run(job("alice", MediaKind::Video)).await;

    assert!(report.is_success());
    assert_eq!(report.stages, vec![
        Stage::Queued,
        Stage::Downloading,
        Stage::Delivering,
        Stage::CleaningUp,
        Stage::Done,
    ]);
    assert_eq!(h.transcoder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.transport.terminal_for("alice"), 1);
    assert!(h.leftover_files().is_empty());
}

#[tokio::test]
async fn non_mp4_video_is_converted_before_delivery() {
    let h = harness(
        FakeExtractor {
            extension: "webm",
            ..Default::default()
        },
        FakeTranscoder::default(),
        FakeTransport::default(),
    );

    let report = h.runner.run(job("alice", MediaKind::Video)).await;

    assert!(report.is_success());
    assert!(report.stages.contains(&Stage::Converting));
    let delivered: Vec<_> = h
        .transport
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Video(_, path) => Some(path),
            _ => None,
        })
        .collect();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].to_string_lossy().ends_with("_converted.mp4"));
    assert!(h.leftover_files().is_empty());
}

#[tokio::test]
async fn audio_is_never_converted() {
    let h = harness(
        FakeExtractor {
            extension: "mp3",
            duration_secs: Some(3_600.0),
            ..Default::default()
        },
        FakeTranscoder::default(),
        FakeTransport::default(),
    );

    let report = h.runner.run(job("alice", MediaKind::Audio)).await;

    assert!(report.is_success(), "duration limit applies to video only");
    assert_eq!(h.transcoder.calls.load(Ordering::SeqCst), 0);
    assert!(matches!(h.transport.calls().as_slice(), [
        Call::Text(..),
        Call::Audio(..),
        Call::Delete(..)
    ]));
}

#[tokio::test]
async fn overlong_video_is_refused_before_download() {
    let h = harness(
        FakeExtractor {
            duration_secs: Some(361.0),
            ..Default::default()
        },
        FakeTranscoder::default(),
        FakeTransport::default(),
    );

    let report = h.runner.run(job("alice", MediaKind::Video)).await;

    assert!(matches!(
        report.outcome,
        Err(PipelineError::DurationExceeded { limit_secs: 360, .. })
    ));
    assert_eq!(h.extractor.fetches.load(Ordering::SeqCst), 0);
    assert!(h.leftover_files().is_empty());
    assert_eq!(h.transport.terminal_for("alice"), 1);
}

#[tokio::test]
async fn video_at_exactly_the_limit_is_accepted() {
    let h = harness(
        FakeExtractor {
            duration_secs: Some(360.0),
            ..Default::default()
        },
        FakeTranscoder::default(),
        FakeTransport::default(),
    );
    assert!(h.runner.run(job("alice", MediaKind::Video)).await.is_success());
}

#[tokio::test]
async fn unavailable_media_fails_extraction() {
    let h = harness(
        FakeExtractor {
            available: false,
            ..Default::default()
        },
        FakeTranscoder::default(),
        FakeTransport::default(),
    );
    let report = h.runner.run(job("alice", MediaKind::Audio)).await;
    assert_eq!(report.outcome.unwrap_err().kind(), "extraction_failed");
    assert_eq!(h.extractor.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn extractor_message_reaches_dm_verbatim_and_partials_are_removed() {
    let h = harness(
        FakeExtractor {
            fail_fetch: Some("ERROR: [generic] Unsupported URL"),
            ..Default::default()
        },
        FakeTranscoder::default(),
        FakeTransport::default(),
    );

    let report = h.runner.run(job("alice", MediaKind::Video)).await;

    assert_eq!(
        report.outcome,
        Err(PipelineError::ExtractionFailed {
            message: "ERROR: [generic] Unsupported URL".into()
        })
    );
    assert!(h.transport.calls().contains(&Call::Text(
        "alice".into(),
        "❌ Error: Download failed: ERROR: [generic] Unsupported URL".into()
    )));
    assert!(h.leftover_files().is_empty());
}

#[tokio::test]
async fn conversion_failure_cleans_every_file_and_skips_delivery() {
    let h = harness(
        FakeExtractor {
            extension: "mkv",
            ..Default::default()
        },
        FakeTranscoder {
            fail: true,
            ..Default::default()
        },
        FakeTransport::default(),
    );

    let report = h.runner.run(job("alice", MediaKind::Video)).await;

    assert_eq!(report.outcome.as_ref().unwrap_err().kind(), "conversion_failed");
    assert_eq!(report.stages.last(), Some(&Stage::Errored));
    assert!(
        !h.transport
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Video(..)))
    );
    assert_eq!(h.transport.terminal_for("alice"), 1);
    assert!(h.leftover_files().is_empty());
}

#[tokio::test]
async fn delivery_failure_is_one_generic_error_in_groups() {
    let h = harness(FakeExtractor::default(), FakeTranscoder::default(), FakeTransport {
        fail_upload: true,
        ..Default::default()
    });
    let mut job = job("alice", MediaKind::Video);
    job.reply_target = reply("group-1", ChatType::Group);

    let report = h.runner.run(job).await;

    assert_eq!(report.outcome.unwrap_err().kind(), "delivery_failed");
    let errors: Vec<_> = h
        .transport
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Text(_, t) if t.starts_with('❌')))
        .collect();
    assert_eq!(errors, vec![Call::Text(
        "group-1".into(),
        "❌ Error when processing your request. Please try again or contact support.".into()
    )]);
    assert!(h.leftover_files().is_empty());
}

#[tokio::test]
async fn other_jobs_files_survive_cleanup() {
    let h = harness(FakeExtractor::default(), FakeTranscoder::default(), FakeTransport::default());
    let foreign = h.tmp.path().join("video_someoneelse.mp4");
    std::fs::write(&foreign, b"x").unwrap();

    h.runner.run(job("alice", MediaKind::Video)).await;

    assert_eq!(h.leftover_files(), vec![foreign]);
}

#[tokio::test]
async fn ack_is_dismissed_when_processing_starts() {
    let h = harness(FakeExtractor::default(), FakeTranscoder::default(), FakeTransport::default());
    let mut job = job("alice", MediaKind::Video);
    job.ack = Some(MessageRef("ack-9".into()));

    h.runner.run(job).await;

    assert_eq!(
        h.transport.calls().first(),
        Some(&Call::Delete("alice".into(), "ack-9".into()))
    );
}

// ── Dispatch properties ──────────────────────────────────────────────────────

/// Records dispatch order without running a pipeline.
#[derive(Default)]
struct RecordingHandler {
    seen: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn handle(&self, job: Job) {
        self.seen
            .lock()
            .unwrap()
            .push((job.requester_id.to_string(), job.url));
    }
}

fn dispatcher(store: &Arc<QueueStore>, handler: Arc<dyn JobHandler>) -> Dispatcher {
    Dispatcher::new(
        Arc::clone(store),
        handler,
        WorkerPool::new(ConcurrencyLimit::Unbounded),
        Duration::from_millis(500),
    )
}

fn queued(requester: &str, url: &str) -> Job {
    Job::new(
        requester.into(),
        url,
        MediaKind::Video,
        reply(requester, ChatType::Dm),
        None,
    )
}

#[tokio::test]
async fn one_tick_dispatches_every_requester_once() {
    let store = Arc::new(QueueStore::new());
    let handler = Arc::new(RecordingHandler::default());
    let dispatcher = dispatcher(&store, handler.clone());

    store.enqueue(queued("alice", "https://a/1"));
    store.enqueue(queued("bob", "https://b/1"));
    store.enqueue(queued("alice", "https://a/2"));

    assert_eq!(dispatcher.tick(), 2);
    assert!(dispatcher.pool().shutdown(Duration::from_secs(1)).await);

    let mut seen = handler.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec![
        ("alice".to_string(), "https://a/1".to_string()),
        ("bob".to_string(), "https://b/1".to_string()),
    ]);
    assert_eq!(store.pending(&"alice".into()), 1);
}

#[tokio::test]
async fn requester_jobs_dispatch_in_enqueue_order() {
    let store = Arc::new(QueueStore::new());
    let handler = Arc::new(RecordingHandler::default());
    let dispatcher = dispatcher(&store, handler.clone());

    for i in 0..5 {
        store.enqueue(queued("alice", &format!("https://a/{i}")));
    }
    // One tick at a time, waiting for each spawned job, so the recorded order
    // is the dispatch order.
    for _ in 0..5 {
        assert_eq!(dispatcher.tick(), 1);
        while dispatcher.pool().in_flight() > 0 {
            tokio::task::yield_now().await;
        }
    }
    assert_eq!(dispatcher.tick(), 0);

    let urls: Vec<String> = handler
        .seen
        .lock()
        .unwrap()
        .iter()
        .map(|(_, url)| url.clone())
        .collect();
    assert_eq!(urls, (0..5).map(|i| format!("https://a/{i}")).collect::<Vec<_>>());
}

#[tokio::test]
async fn every_dispatched_job_reaches_exactly_one_outcome() {
    let h = harness(
        FakeExtractor {
            extension: "webm",
            ..Default::default()
        },
        FakeTranscoder::default(),
        FakeTransport::default(),
    );
    let store = Arc::new(QueueStore::new());
    let dispatcher = dispatcher(&store, Arc::new(h.runner.clone()));

    let requesters = ["r1", "r2", "r3", "r4"];
    for requester in requesters {
        store.enqueue(job(requester, MediaKind::Video));
        store.enqueue(job(requester, MediaKind::Audio));
    }
    while !store.is_empty() {
        dispatcher.tick();
    }
    assert!(dispatcher.pool().shutdown(Duration::from_secs(5)).await);

    for requester in requesters {
        assert_eq!(h.transport.terminal_for(requester), 2, "requester {requester}");
    }
    assert!(h.leftover_files().is_empty());
}

// ── Admission → queue → pipeline ─────────────────────────────────────────────

#[tokio::test]
async fn admitted_audio_request_is_delivered_as_audio() {
    let h = harness(
        FakeExtractor {
            extension: "mp3",
            ..Default::default()
        },
        FakeTranscoder::default(),
        FakeTransport::default(),
    );
    let store = Arc::new(QueueStore::new());
    let admission = AdmissionService::new(
        AdmissionFilter::new(
            SitePolicy::new(
                vec!["video-site.example".into()],
                vec!["blocked.example".into()],
            ),
            "-a",
        )
        .unwrap(),
        Arc::clone(&store),
        ResultNotifier::new(h.transport.clone()),
    );

    admission
        .admit(
            "carol".into(),
            "https://video-site.example/clip -a",
            reply("carol", ChatType::Dm),
        )
        .await
        .unwrap();
    assert!(
        admission
            .admit(
                "carol".into(),
                "https://blocked.example/x",
                reply("carol", ChatType::Dm)
            )
            .await
            .is_err()
    );
    assert_eq!(store.len(), 1);

    let dispatcher = dispatcher(&store, Arc::new(h.runner.clone()));
    assert_eq!(dispatcher.tick(), 1);
    assert!(dispatcher.pool().shutdown(Duration::from_secs(5)).await);

    let calls = h.transport.calls();
    assert!(calls.iter().any(|c| matches!(c, Call::Audio(chat, _) if chat == "carol")));
    // The queued ack (id 0) is removed once processing starts.
    assert!(calls.contains(&Call::Delete("carol".into(), "0".into())));
}

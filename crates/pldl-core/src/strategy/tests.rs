use super::*;
use crate::backend::fake::{FakeBackend, Step};
use crate::retry::SilentRotation;
use crate::task_db::{open_memory, TaskDb, TaskStore};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    db: TaskDb,
    backend: FakeBackend,
    identities: IdentityPool,
    policy: RotationPolicy,
    gate: CancellationGate,
    dir: tempfile::TempDir,
    options: TaskOptions,
}

impl Harness {
    async fn new(backend: FakeBackend) -> Self {
        let db = open_memory().await.unwrap();
        let id = db.create_task("https://example.com/p", None).await.unwrap();
        let store: Arc<dyn TaskStore> = Arc::new(db.clone());
        Self {
            db,
            backend,
            identities: IdentityPool::default(),
            policy: RotationPolicy {
                clients: vec![None, Some("ios".into()), Some("tv".into())],
                backoff_base: Duration::ZERO,
            },
            gate: CancellationGate::new(store, id, Duration::ZERO),
            dir: tempfile::tempdir().unwrap(),
            options: TaskOptions::default(),
        }
    }

    fn ctx(&self, total: usize) -> TrackContext<'_> {
        TrackContext {
            backend: &self.backend,
            identities: &self.identities,
            policy: &self.policy,
            gate: &self.gate,
            listener: &SilentRotation,
            staging_dir: self.dir.path(),
            options: &self.options,
            total,
        }
    }
}

fn track(url: &str) -> Track {
    Track {
        id: "1".into(),
        title: "Song".into(),
        artist: "Band".into(),
        url: url.into(),
        download_index: Some(2),
        ..Default::default()
    }
}

#[test]
fn selection_by_provider() {
    assert_eq!(
        TrackStrategy::select(Provider::Spotify, true),
        TrackStrategy::ToolBacked
    );
    assert_eq!(
        TrackStrategy::select(Provider::Spotify, false),
        TrackStrategy::SearchFallback
    );
    assert_eq!(
        TrackStrategy::select(Provider::Youtube, true),
        TrackStrategy::NativeExtractor
    );
    assert_eq!(
        TrackStrategy::select(Provider::Generic, false),
        TrackStrategy::NativeExtractor
    );
}

#[tokio::test]
async fn native_attempt_returns_new_file() {
    let h = Harness::new(FakeBackend::new()).await;
    let out = TrackStrategy::NativeExtractor
        .run(&h.ctx(3), &track("https://youtu.be/a"))
        .await;
    match out {
        TrackOutcome::Completed(files) => {
            assert_eq!(files, vec![h.dir.path().join("Song - 02_vid.mp3")]);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[tokio::test]
async fn success_without_audio_is_no_output_and_not_retried() {
    let h = Harness::new(FakeBackend::new()).await;
    h.backend.script("https://youtu.be/a", [Step::Nothing]);
    std::fs::write(h.dir.path().join("stale.mp3"), b"old").unwrap();

    let out = TrackStrategy::NativeExtractor
        .run(&h.ctx(1), &track("https://youtu.be/a"))
        .await;
    match out {
        TrackOutcome::Failed { message, kind } => {
            assert_eq!(kind, ErrorKind::NoOutput);
            assert!(message.contains("no audio file was produced"), "{message}");
            assert!(message.contains("stale.mp3"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(h.backend.call_count(), 1);
}

#[tokio::test]
async fn bot_checks_rotate_through_identities() {
    let h = Harness::new(FakeBackend::new()).await;
    h.backend
        .script("https://youtu.be/a", [Step::BotCheck, Step::BotCheck]);
    let out = TrackStrategy::NativeExtractor
        .run(&h.ctx(1), &track("https://youtu.be/a"))
        .await;
    assert!(matches!(out, TrackOutcome::Completed(_)));
    let clients: Vec<_> = h
        .backend
        .calls()
        .into_iter()
        .map(|(_, id)| id.player_client)
        .collect();
    assert_eq!(clients, vec![None, Some("ios".into()), Some("tv".into())]);
}

#[tokio::test]
async fn exhausted_rotation_cites_last_cause() {
    let h = Harness::new(FakeBackend::new()).await;
    h.backend
        .script("https://youtu.be/a", [Step::BotCheck, Step::BotCheck, Step::BotCheck]);
    let out = TrackStrategy::NativeExtractor
        .run(&h.ctx(1), &track("https://youtu.be/a"))
        .await;
    match out {
        TrackOutcome::Failed { message, kind } => {
            assert_eq!(kind, ErrorKind::BotCheck);
            assert!(message.starts_with("all client identities failed; last error:"));
            assert!(message.contains("not a bot"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn generic_tool_exit_is_fatal_on_native_path() {
    let h = Harness::new(FakeBackend::new()).await;
    h.backend.script("https://youtu.be/a", [Step::ToolExit]);
    let out = TrackStrategy::NativeExtractor
        .run(&h.ctx(1), &track("https://youtu.be/a"))
        .await;
    assert!(matches!(out, TrackOutcome::Failed { kind: ErrorKind::Other, .. }));
    assert_eq!(h.backend.call_count(), 1);
}

#[tokio::test]
async fn tool_output_is_renamed() {
    let h = Harness::new(FakeBackend::new()).await;
    let out = TrackStrategy::ToolBacked
        .run(&h.ctx(3), &track("https://open.spotify.com/track/1"))
        .await;
    match out {
        TrackOutcome::Completed(files) => {
            assert_eq!(files, vec![h.dir.path().join("002 - Song.mp3")]);
            assert!(files[0].exists());
        }
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[tokio::test]
async fn tool_without_audio_falls_back_to_search() {
    let h = Harness::new(FakeBackend::new()).await;
    h.backend
        .script("https://open.spotify.com/track/1", [Step::Nothing]);
    let out = TrackStrategy::ToolBacked
        .run(&h.ctx(3), &track("https://open.spotify.com/track/1"))
        .await;
    assert!(matches!(out, TrackOutcome::Completed(_)));
    let requests: Vec<_> = h.backend.calls().into_iter().map(|(r, _)| r).collect();
    assert_eq!(
        requests,
        vec![
            FetchRequest::Tool {
                url: "https://open.spotify.com/track/1".into()
            },
            FetchRequest::Search {
                query: "Band - Song audio".into()
            },
        ]
    );
    assert!(h.dir.path().join("002 - Song.mp3").exists());
}

#[tokio::test]
async fn tool_exits_rotate_then_fall_back() {
    let h = Harness::new(FakeBackend::new()).await;
    h.backend.script(
        "https://open.spotify.com/track/1",
        [Step::ToolExit, Step::ToolExit, Step::ToolExit],
    );
    let out = TrackStrategy::ToolBacked
        .run(&h.ctx(1), &track("https://open.spotify.com/track/1"))
        .await;
    assert!(matches!(out, TrackOutcome::Completed(_)));
    assert_eq!(h.backend.call_count(), 4);
}

#[tokio::test]
async fn tool_config_error_does_not_fall_back() {
    let h = Harness::new(FakeBackend::new()).await;
    h.backend
        .script("https://open.spotify.com/track/1", [Step::Config]);
    let out = TrackStrategy::ToolBacked
        .run(&h.ctx(1), &track("https://open.spotify.com/track/1"))
        .await;
    assert!(matches!(out, TrackOutcome::Failed { .. }));
    assert_eq!(h.backend.call_count(), 1);
}

#[tokio::test]
async fn cancelled_before_first_attempt() {
    let h = Harness::new(FakeBackend::new()).await;
    let id = h.db.create_task("https://example.com/q", None).await.unwrap();
    h.db.request_cancel(&id).await.unwrap();
    let store: Arc<dyn TaskStore> = Arc::new(h.db.clone());
    let gate = CancellationGate::new(store, id, Duration::ZERO);
    let ctx = TrackContext {
        gate: &gate,
        ..h.ctx(1)
    };
    let out = TrackStrategy::SearchFallback
        .run(&ctx, &track("https://open.spotify.com/track/1"))
        .await;
    assert!(matches!(out, TrackOutcome::Cancelled));
    assert_eq!(h.backend.call_count(), 0);
}

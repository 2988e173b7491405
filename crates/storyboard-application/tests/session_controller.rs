use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storyboard_application::{RunSummary, SessionController};
use storyboard_core::backend::{
    ByteStream, ImageGenerator, ImageRequest, ImageResult, PromptStream, StorylineSink,
};
use storyboard_core::scene::StoryDocument;
use storyboard_core::view::{Presenter, SceneView, Status};
use storyboard_core::{Result, StoryboardError};

// ----------------------------------------------------------------------------
// Fakes
// ----------------------------------------------------------------------------

/// Emits each frame after its delay (milliseconds, relative to the previous one).
struct ScriptedStream {
    frames: Vec<(u64, Result<String>)>,
}

impl ScriptedStream {
    fn new(frames: Vec<(u64, String)>) -> Self {
        Self {
            frames: frames.into_iter().map(|(delay, f)| (delay, Ok(f))).collect(),
        }
    }
}

#[async_trait]
impl PromptStream for ScriptedStream {
    async fn open_stream(&self, _content: &str) -> Result<ByteStream> {
        let frames = self.frames.clone();
        let stream = futures::stream::iter(frames).then(|(delay, frame)| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            frame.map(Bytes::from)
        });
        Ok(Box::pin(stream))
    }
}

struct UnreachableStream;

#[async_trait]
impl PromptStream for UnreachableStream {
    async fn open_stream(&self, _content: &str) -> Result<ByteStream> {
        Err(StoryboardError::transport("connection refused"))
    }
}

#[derive(Default)]
struct FakeImages {
    delay_ms: u64,
    fail_once: Mutex<HashSet<String>>,
    requests: Mutex<Vec<ImageRequest>>,
}

impl FakeImages {
    fn with_delay(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    fn failing_once(self, prompt: &str) -> Self {
        self.fail_once.lock().unwrap().insert(prompt.to_string());
        self
    }

    fn prompts(&self) -> Vec<(String, usize, String)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.session_name.clone(), r.scene_index, r.prompt.clone()))
            .collect()
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResult> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        if self.fail_once.lock().unwrap().remove(&request.prompt) {
            return Err(StoryboardError::rejected("generate_image", "provider refused"));
        }
        Ok(ImageResult {
            url: format!(
                "http://img/{}/{}/{}.png",
                request.session_name, request.scene_index, call
            ),
            revised_prompt: None,
        })
    }
}

#[derive(Default)]
struct FakeSink {
    fail: bool,
    saved: Mutex<Vec<StoryDocument>>,
}

#[async_trait]
impl StorylineSink for FakeSink {
    async fn save(&self, document: &StoryDocument) -> Result<()> {
        if self.fail {
            return Err(StoryboardError::http_status(500, "Internal Server Error"));
        }
        self.saved.lock().unwrap().push(document.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Shown {
    Clear,
    Scene(String, SceneView),
    Status(Status),
}

#[derive(Default)]
struct RecordingPresenter {
    shown: Vec<Shown>,
}

impl RecordingPresenter {
    fn clears(&self) -> usize {
        self.shown.iter().filter(|s| **s == Shown::Clear).count()
    }

    fn scenes(&self) -> Vec<(&str, &SceneView)> {
        self.shown
            .iter()
            .filter_map(|s| match s {
                Shown::Scene(session, view) => Some((session.as_str(), view)),
                _ => None,
            })
            .collect()
    }
}

impl Presenter for RecordingPresenter {
    fn clear(&mut self) {
        self.shown.push(Shown::Clear);
    }

    fn render_scene(&mut self, session: &str, view: &SceneView) {
        self.shown.push(Shown::Scene(session.to_string(), view.clone()));
    }

    fn show_status(&mut self, status: &Status) {
        self.shown.push(Shown::Status(status.clone()));
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn frame(payload: serde_json::Value) -> String {
    format!("data: {}\n\n", payload)
}

fn scenes(session: &str, pairs: &[(&str, &str)]) -> String {
    let records: Vec<_> = pairs
        .iter()
        .map(|(d, p)| json!({ "description": d, "imagePrompt": p }))
        .collect();
    frame(json!({ session: records }))
}

fn controller(
    stream: impl PromptStream + 'static,
    images: Arc<FakeImages>,
    sink: Arc<FakeSink>,
) -> SessionController<RecordingPresenter> {
    SessionController::new(
        Arc::new(stream),
        images,
        sink,
        RecordingPresenter::default(),
    )
}

async fn run(
    frames: Vec<(u64, String)>,
    images: Arc<FakeImages>,
) -> (SessionController<RecordingPresenter>, RunSummary) {
    let mut controller = controller(ScriptedStream::new(frames), images, Arc::default());
    let summary = controller.start("a story about cats").await.unwrap();
    (controller, summary)
}

fn image_url(controller: &SessionController<RecordingPresenter>, session: &str, index: usize) -> Option<String> {
    controller
        .store()
        .session(session)?
        .scene(index)?
        .image
        .as_ref()
        .map(|image| image.url.clone())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_two_event_scenario_requests_each_scene_once() {
    let images = Arc::new(FakeImages::with_delay(5));
    let (controller, summary) = run(
        vec![
            (0, scenes("story", &[("d1", "p1")])),
            (20, scenes("story", &[("d1", "p1"), ("d2", "p2")])),
        ],
        images.clone(),
    )
    .await;

    assert_eq!(
        images.prompts(),
        vec![
            ("story".to_string(), 0, "p1".to_string()),
            ("story".to_string(), 1, "p2".to_string()),
        ]
    );
    assert_eq!(summary.events, 2);
    assert_eq!(summary.requests, 2);
    assert_eq!(summary.images_applied, 2);
    assert!(image_url(&controller, "story", 0).is_some());
    assert!(image_url(&controller, "story", 1).is_some());
    assert_eq!(controller.status(), &Status::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_snapshot_is_idempotent() {
    let images = Arc::new(FakeImages::with_delay(1_000));
    let snapshot = scenes("story", &[("d1", "p1")]);
    let (controller, summary) =
        run(vec![(0, snapshot.clone()), (10, snapshot)], images.clone()).await;

    assert_eq!(images.prompts().len(), 1);
    assert_eq!(summary.requests, 1);

    let before_image: Vec<_> = controller
        .presenter()
        .scenes()
        .into_iter()
        .filter(|(_, view)| view.image_src.is_none())
        .collect();
    assert_eq!(before_image.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_prompt_change_in_flight_requests_latest_prompt_once() {
    let images = Arc::new(FakeImages::with_delay(50));
    let (controller, summary) = run(
        vec![
            (0, scenes("story", &[("d", "a cat")])),
            (10, scenes("story", &[("d", "a cat on a roof")])),
            (10, scenes("story", &[("d", "a cat on a roof")])),
        ],
        images.clone(),
    )
    .await;

    let prompts: Vec<_> = images.prompts().into_iter().map(|(_, _, p)| p).collect();
    assert_eq!(prompts, vec!["a cat", "a cat on a roof"]);
    assert_eq!(summary.images_applied, 1);
    assert_eq!(summary.stale_dropped, 1);

    let scene = controller.store().session("story").unwrap().scene(0).unwrap();
    assert_eq!(scene.image_prompt.as_deref(), Some("a cat on a roof"));
    assert!(scene.has_confirmed_image());
}

#[tokio::test(start_paused = true)]
async fn test_flapping_back_to_outstanding_prompt_does_not_redispatch() {
    let images = Arc::new(FakeImages::with_delay(50));
    let (_controller, summary) = run(
        vec![
            (0, scenes("story", &[("d", "a")])),
            (10, scenes("story", &[("d", "b")])),
            (10, scenes("story", &[("d", "a")])),
        ],
        images.clone(),
    )
    .await;

    let prompts: Vec<_> = images.prompts().into_iter().map(|(_, _, p)| p).collect();
    assert_eq!(prompts, vec!["a"]);
    assert_eq!(summary.images_applied, 1);
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_image_survives_repeated_prompt() {
    let images = Arc::new(FakeImages::with_delay(5));
    let (controller, summary) = run(
        vec![
            (0, scenes("story", &[("d1", "p1")])),
            (50, scenes("story", &[("d1", "p1")])),
            (50, scenes("story", &[("d1 longer", "p1")])),
        ],
        images.clone(),
    )
    .await;

    assert_eq!(summary.requests, 1);
    let url = image_url(&controller, "story", 0);
    assert_eq!(url.as_deref(), Some("http://img/story/0/1.png"));
    let scene = controller.store().session("story").unwrap().scene(0).unwrap();
    assert_eq!(scene.description.as_deref(), Some("d1 longer"));
}

#[tokio::test(start_paused = true)]
async fn test_result_for_abandoned_session_is_dropped() {
    let images = Arc::new(FakeImages::with_delay(50));
    let (controller, summary) = run(
        vec![
            (0, scenes("s1", &[("first", "p1")])),
            (10, scenes("s2", &[("second", "q1")])),
        ],
        images.clone(),
    )
    .await;

    assert_eq!(images.prompts().len(), 2);
    assert_eq!(summary.stale_dropped, 1);
    assert_eq!(summary.images_applied, 1);
    assert_eq!(
        image_url(&controller, "s2", 0).as_deref(),
        Some("http://img/s2/0/2.png")
    );
    assert!(image_url(&controller, "s1", 0).is_none());
    assert_eq!(controller.store().active_session_name(), Some("s2"));
}

#[tokio::test(start_paused = true)]
async fn test_session_switch_clears_rendered_scenes() {
    let images = Arc::new(FakeImages::with_delay(1_000));
    let (controller, _summary) = run(
        vec![
            (0, scenes("s1", &[("first", "p1")])),
            (10, scenes("s2", &[("second", "q1")])),
        ],
        images,
    )
    .await;

    let presenter = controller.presenter();
    // Once on start, once on the switch.
    assert_eq!(presenter.clears(), 2);
    let last_clear = presenter
        .shown
        .iter()
        .rposition(|s| *s == Shown::Clear)
        .unwrap();
    let after_switch: Vec<_> = presenter.shown[last_clear..]
        .iter()
        .filter_map(|s| match s {
            Shown::Scene(session, _) => Some(session.as_str()),
            _ => None,
        })
        .collect();
    assert!(!after_switch.is_empty());
    assert!(after_switch.iter().all(|session| *session == "s2"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_request_is_retried_by_next_snapshot() {
    let images = Arc::new(FakeImages::with_delay(5).failing_once("p1"));
    let (controller, summary) = run(
        vec![
            (0, scenes("story", &[("d1", "p1")])),
            (50, scenes("story", &[("d1", "p1")])),
        ],
        images.clone(),
    )
    .await;

    assert_eq!(images.prompts().len(), 2);
    assert_eq!(summary.failed_requests, 1);
    assert_eq!(summary.images_applied, 1);
    assert!(image_url(&controller, "story", 0).is_some());
    assert!(
        controller
            .presenter()
            .shown
            .iter()
            .any(|s| matches!(s, Shown::Status(Status::Failed(_))))
    );
    // The retry succeeded, so the run ends without a failure showing.
    assert_eq!(controller.status(), &Status::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_failure_for_abandoned_session_is_dropped_silently() {
    let images = Arc::new(FakeImages::with_delay(50).failing_once("p1"));
    let (controller, summary) = run(
        vec![
            (0, scenes("s1", &[("first", "p1")])),
            (10, scenes("s2", &[("second", "q1")])),
        ],
        images.clone(),
    )
    .await;

    assert_eq!(images.prompts().len(), 2);
    assert_eq!(summary.failed_requests, 0);
    assert_eq!(summary.stale_dropped, 1);
    assert_eq!(summary.images_applied, 1);
    assert!(image_url(&controller, "s2", 0).is_some());
    assert_eq!(controller.status(), &Status::Idle);
    assert!(
        !controller
            .presenter()
            .shown
            .iter()
            .any(|s| matches!(s, Shown::Status(Status::Failed(_))))
    );
}

#[tokio::test(start_paused = true)]
async fn test_unretried_failure_stays_visible() {
    let images = Arc::new(FakeImages::with_delay(5).failing_once("p1"));
    let (controller, summary) =
        run(vec![(0, scenes("story", &[("d1", "p1")]))], images).await;

    assert_eq!(summary.failed_requests, 1);
    assert!(matches!(controller.status(), Status::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_bad_payloads_are_skipped() {
    let images = Arc::new(FakeImages::with_delay(5));
    let (controller, summary) = run(
        vec![
            (0, "data: {\"story\": [\n\n".to_string()),
            (0, frame(json!([1, 2]))),
            (0, "event: ping\n\n".to_string()),
            (0, scenes("story", &[("d1", "p1")])),
        ],
        images,
    )
    .await;

    assert_eq!(summary.decode_errors, 2);
    assert_eq!(summary.events, 2);
    assert_eq!(summary.images_applied, 1);
    assert_eq!(controller.store().sessions().len(), 1);
}

#[tokio::test]
async fn test_unreachable_stream_reports_failure() {
    let mut controller = controller(UnreachableStream, Arc::default(), Arc::default());
    let err = controller.start("anything").await.unwrap_err();
    assert!(err.is_transport());
    assert!(matches!(controller.status(), Status::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_stream_keeps_received_scenes() {
    let images = Arc::new(FakeImages::with_delay(5));
    let stream = ScriptedStream {
        frames: vec![
            (0, Ok(scenes("story", &[("d1", "p1")]))),
            (10, Err(StoryboardError::transport("connection reset"))),
        ],
    };
    let mut controller = controller(stream, images, Arc::default());

    let err = controller.start("cats").await.unwrap_err();
    assert!(err.is_transport());
    assert!(matches!(controller.status(), Status::Failed(_)));
    // Requests already sent still complete.
    assert!(image_url(&controller, "story", 0).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_new_start_discards_previous_sessions() {
    let images = Arc::new(FakeImages::with_delay(5));
    let mut controller = controller(
        ScriptedStream::new(vec![(0, scenes("story", &[("d1", "p1")]))]),
        images.clone(),
        Arc::default(),
    );

    controller.start("first").await.unwrap();
    controller.start("second").await.unwrap();

    assert_eq!(controller.store().sessions().len(), 1);
    // Same prompt in a fresh run is requested again.
    assert_eq!(images.prompts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_save_reports_status_and_keeps_store() {
    let sink = Arc::new(FakeSink::default());
    let mut controller = controller(
        ScriptedStream::new(vec![(0, scenes("story", &[("d1", "p1")]))]),
        Arc::new(FakeImages::with_delay(5)),
        sink.clone(),
    );

    assert!(matches!(controller.save().await, Status::SaveFailed(_)));
    assert!(sink.saved.lock().unwrap().is_empty());

    controller.start("cats").await.unwrap();
    assert_eq!(controller.save().await, Status::Saved);

    let saved = sink.saved.lock().unwrap();
    let scene = &saved[0].stories["story"][0];
    assert_eq!(scene.image_prompt.as_deref(), Some("p1"));
    assert!(scene.scene_image.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_leaves_store_for_manual_retry() {
    let sink = Arc::new(FakeSink {
        fail: true,
        ..FakeSink::default()
    });
    let mut controller = controller(
        ScriptedStream::new(vec![(0, scenes("story", &[("d1", "p1")]))]),
        Arc::new(FakeImages::with_delay(5)),
        sink,
    );
    controller.start("cats").await.unwrap();

    let status = controller.save().await;
    assert_eq!(status, Status::SaveFailed("server returned 500".to_string()));
    assert_eq!(controller.status(), &status);
    assert_eq!(controller.store().sessions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_regenerate_with_edited_prompt() {
    let images = Arc::new(FakeImages::with_delay(5));
    let (mut controller, _summary) =
        run(vec![(0, scenes("story", &[("d1", "p1")]))], images.clone()).await;

    assert!(controller.regenerate_image(0, Some("p1 at sunset")).await);
    assert!(!controller.regenerate_image(7, None).await);

    assert_eq!(images.prompts().last().unwrap().2, "p1 at sunset");
    let scene = controller.store().session("story").unwrap().scene(0).unwrap();
    assert_eq!(scene.image_prompt.as_deref(), Some("p1 at sunset"));
    assert_eq!(
        image_url(&controller, "story", 0).as_deref(),
        Some("http://img/story/0/2.png")
    );
}

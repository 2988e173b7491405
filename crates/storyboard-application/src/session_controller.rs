//! Session controller implementation.
//!
//! This module provides the `SessionController` which drives one generation
//! stream end to end: decoding events, reconciling snapshots into the store,
//! dispatching image requests and presenting the result.

use crate::dispatcher::{Completion, DispatchOutcome, ImageDispatcher};
use futures::StreamExt;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use storyboard_core::backend::{ImageGenerator, PromptStream, StorylineSink};
use storyboard_core::reconciler::{Reconciler, Reconciliation};
use storyboard_core::scene::{SceneKey, Snapshot};
use storyboard_core::store::SnapshotStore;
use storyboard_core::view::{Presenter, Status};
use storyboard_core::Result;
use storyboard_interaction::decode_events;

/// Counters for one `start` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Events decoded from the stream (including ones that were not snapshots).
    pub events: usize,
    /// Segments or payloads that could not be decoded.
    pub decode_errors: usize,
    /// Image requests sent, follow-ups included.
    pub requests: usize,
    pub images_applied: usize,
    pub stale_dropped: usize,
    pub failed_requests: usize,
}

/// Drives generation sessions.
///
/// # Responsibilities
///
/// - Owning the snapshot store and the reconciler for the current stream
/// - Feeding decoded events to the reconciler strictly in arrival order
/// - Dispatching image requests and applying their completions
/// - Saving the store through the configured sink
///
/// Only one stream is consumed at a time. `start` returns once the stream has
/// ended and every image request it caused has completed.
pub struct SessionController<P: Presenter> {
    stream: Arc<dyn PromptStream>,
    sink: Arc<dyn StorylineSink>,
    dispatcher: ImageDispatcher,
    store: SnapshotStore,
    reconciler: Reconciler,
    presenter: P,
    status: Status,
    /// Scenes of the active session whose last image request failed.
    image_failures: BTreeSet<SceneKey>,
    streaming: bool,
}

impl<P: Presenter> SessionController<P> {
    pub fn new(
        stream: Arc<dyn PromptStream>,
        generator: Arc<dyn ImageGenerator>,
        sink: Arc<dyn StorylineSink>,
        presenter: P,
    ) -> Self {
        Self {
            stream,
            sink,
            dispatcher: ImageDispatcher::new(generator),
            store: SnapshotStore::new(),
            reconciler: Reconciler::new(),
            presenter,
            status: Status::Idle,
            image_failures: BTreeSet::new(),
            streaming: false,
        }
    }

    /// Runs one generation for `content`.
    ///
    /// Previous state is discarded first. Decode errors are counted and
    /// skipped; a transport error ends the run with `Status::Failed` after
    /// the image requests already sent have completed.
    pub async fn start(&mut self, content: &str) -> Result<RunSummary> {
        self.store.reset();
        self.reconciler.reset();
        self.image_failures.clear();
        self.presenter.clear();
        self.set_status(Status::Loading);
        tracing::info!("[SessionController] starting generation ({} chars)", content.len());

        let bytes = match self.stream.open_stream(content).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!("[SessionController] could not open stream: {}", err);
                self.set_status(Status::Failed(err.status_text()));
                return Err(err);
            }
        };

        let mut summary = RunSummary::default();
        self.streaming = true;
        let mut events = Box::pin(decode_events(bytes));
        let mut stream_error = None;

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(value)) => self.handle_event(value, &mut summary),
                    Some(Err(err)) if err.is_decode() => {
                        summary.decode_errors += 1;
                        tracing::warn!("[SessionController] skipped event: {}", err);
                    }
                    Some(Err(err)) => {
                        tracing::error!("[SessionController] stream interrupted: {}", err);
                        stream_error = Some(err);
                        break;
                    }
                    None => break,
                },
                Some(outcome) = self.dispatcher.next_outcome(), if self.dispatcher.outstanding() > 0 => {
                    self.handle_outcome(outcome, &mut summary);
                }
            }
        }

        self.settle(&mut summary).await;
        self.streaming = false;
        tracing::info!("[SessionController] run finished: {:?}", summary);

        match stream_error {
            Some(err) => {
                self.set_status(Status::Failed(err.status_text()));
                Err(err)
            }
            None => {
                if matches!(self.status, Status::Loading | Status::Streaming) {
                    self.set_status(Status::Idle);
                }
                Ok(summary)
            }
        }
    }

    /// Re-requests the image of scene `index` in the active session.
    ///
    /// `prompt_override` replaces the stored prompt first. Waits for the
    /// request to complete and returns whether one was sent.
    pub async fn regenerate_image(&mut self, index: usize, prompt_override: Option<&str>) -> bool {
        let request = self
            .reconciler
            .regenerate(&mut self.store, index, prompt_override);
        let refreshed = self.reconciler.refresh(&self.store);
        self.present(&refreshed);

        let Some(request) = request else {
            return false;
        };
        let mut summary = RunSummary::default();
        self.dispatcher.dispatch(request);
        self.settle(&mut summary).await;
        true
    }

    /// Sends the whole store to the sink.
    ///
    /// No retry; on failure the store is left as it was so the user can try
    /// again.
    pub async fn save(&mut self) -> Status {
        let document = self.store.to_document();
        if document.is_empty() {
            self.set_status(Status::SaveFailed("nothing to save".to_string()));
            return self.status.clone();
        }

        self.set_status(Status::Saving);
        let status = match self.sink.save(&document).await {
            Ok(()) => {
                tracing::info!("[SessionController] saved {} stories", document.stories.len());
                Status::Saved
            }
            Err(err) => {
                tracing::error!("[SessionController] save failed: {}", err);
                Status::SaveFailed(err.status_text())
            }
        };
        self.set_status(status);
        self.status.clone()
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Waits for every in-flight image request, follow-ups included.
    async fn settle(&mut self, summary: &mut RunSummary) {
        while let Some(outcome) = self.dispatcher.next_outcome().await {
            self.handle_outcome(outcome, summary);
        }
    }

    fn handle_event(&mut self, value: Value, summary: &mut RunSummary) {
        summary.events += 1;
        let snapshot = match Snapshot::from_value(value) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                summary.decode_errors += 1;
                tracing::warn!("[SessionController] ignored event: {}", err);
                return;
            }
        };
        tracing::debug!(
            "[SessionController] snapshot with {} session(s)",
            snapshot.sessions.len()
        );

        if self.status == Status::Loading {
            self.set_status(Status::Streaming);
        }

        let reconciliation = self.reconciler.reconcile(&mut self.store, &snapshot);
        if let Some(active) = reconciliation.active_session.as_deref() {
            if reconciliation.cleared {
                self.image_failures.retain(|key| key.session == active);
                self.restore_status_after_failures();
            }
        }
        self.present(&reconciliation);
        for request in reconciliation.requests {
            summary.requests += 1;
            self.dispatcher.dispatch(request);
        }
    }

    fn handle_outcome(&mut self, outcome: DispatchOutcome, summary: &mut RunSummary) {
        match self.dispatcher.complete(&mut self.store, outcome) {
            Completion::Applied(key) => {
                summary.images_applied += 1;
                let refreshed = self.reconciler.refresh(&self.store);
                self.present(&refreshed);
                if self.image_failures.remove(&key) {
                    self.restore_status_after_failures();
                }
            }
            Completion::Stale(_) => summary.stale_dropped += 1,
            Completion::Superseded { .. } => {
                summary.stale_dropped += 1;
                summary.requests += 1;
            }
            Completion::Failed { key, reason } => {
                summary.failed_requests += 1;
                self.set_status(Status::Failed(format!("image for scene {}: {}", key.index, reason)));
                self.image_failures.insert(key);
            }
        }
    }

    /// Drops an image failure status once no failed scene is left.
    fn restore_status_after_failures(&mut self) {
        if !self.image_failures.is_empty() || !matches!(self.status, Status::Failed(_)) {
            return;
        }
        let status = if self.streaming {
            Status::Streaming
        } else {
            Status::Idle
        };
        self.set_status(status);
    }

    fn present(&mut self, reconciliation: &Reconciliation) {
        if reconciliation.cleared {
            self.presenter.clear();
        }
        let Some(session) = reconciliation.active_session.as_deref() else {
            return;
        };
        for view in &reconciliation.renders {
            self.presenter.render_scene(session, view);
        }
    }

    fn set_status(&mut self, status: Status) {
        if self.status != status {
            self.presenter.show_status(&status);
        }
        self.status = status;
    }
}

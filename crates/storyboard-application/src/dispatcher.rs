//! Image request dispatch.
//!
//! Every request runs as its own task on a [`JoinSet`]; completions come back
//! in whatever order the provider answers. Tasks are never aborted when their
//! session is abandoned. Their results are dropped by the session guard in
//! [`ImageDispatcher::complete`] instead.

use std::sync::Arc;
use storyboard_core::backend::{ImageGenerator, ImageRequest, ImageResult};
use storyboard_core::scene::SceneKey;
use storyboard_core::store::SnapshotStore;
use storyboard_core::Result;
use tokio::task::JoinSet;

/// A finished collaborator call, not yet applied to the store.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub request: ImageRequest,
    pub result: Result<ImageResult>,
}

impl DispatchOutcome {
    pub fn key(&self) -> SceneKey {
        SceneKey::new(&self.request.session_name, self.request.scene_index)
    }
}

/// What applying an outcome did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The image was written into the store.
    Applied(SceneKey),
    /// The result no longer matches the store (session switched, scene gone,
    /// prompt superseded) and was dropped.
    Stale(SceneKey),
    /// The prompt changed while the request was in flight; the latest prompt
    /// was dispatched in its place.
    Superseded { key: SceneKey, follow_up: String },
    /// The request failed; the prompt may be retried by a later snapshot.
    Failed { key: SceneKey, reason: String },
}

pub struct ImageDispatcher {
    generator: Arc<dyn ImageGenerator>,
    tasks: JoinSet<DispatchOutcome>,
}

impl ImageDispatcher {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            generator,
            tasks: JoinSet::new(),
        }
    }

    /// Spawns the collaborator call for `request`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&mut self, request: ImageRequest) {
        tracing::debug!(
            "[ImageDispatcher] requesting image for {}#{}",
            request.session_name,
            request.scene_index
        );
        let generator = Arc::clone(&self.generator);
        self.tasks.spawn(async move {
            let result = generator.generate_image(&request).await;
            DispatchOutcome { request, result }
        });
    }

    /// Number of requests still in flight.
    pub fn outstanding(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for the next request to finish.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_outcome(&mut self) -> Option<DispatchOutcome> {
        loop {
            match self.tasks.join_next().await? {
                Ok(outcome) => return Some(outcome),
                Err(err) => {
                    tracing::error!("[ImageDispatcher] image task ended abnormally: {}", err);
                }
            }
        }
    }

    /// Applies a finished request to `store`.
    ///
    /// Success is written only while the request's session is still active
    /// and the scene still exists. Failure leaves the store untouched and
    /// releases the prompt for a retry.
    pub fn complete(&mut self, store: &mut SnapshotStore, outcome: DispatchOutcome) -> Completion {
        let key = outcome.key();
        let DispatchOutcome { request, result } = outcome;
        let finish = store
            .requests_mut()
            .finish(&key, &request.prompt, result.is_ok());
        let session_active = store.active_session_name() == Some(request.session_name.as_str());

        if let Some(next) = finish.follow_up {
            if !session_active {
                // Nobody will see this session again; release the queued prompt.
                store.requests_mut().finish(&key, &next, false);
                tracing::debug!("[ImageDispatcher] dropped follow-up for inactive {}", key);
                return Completion::Stale(key);
            }
            tracing::debug!(
                "[ImageDispatcher] {} superseded while in flight; requesting '{}'",
                key,
                next
            );
            self.dispatch(ImageRequest {
                prompt: next.clone(),
                session_name: request.session_name,
                scene_index: request.scene_index,
            });
            return Completion::Superseded {
                key,
                follow_up: next,
            };
        }

        match result {
            Ok(image) => {
                if !finish.apply || !session_active {
                    tracing::warn!("[ImageDispatcher] dropped stale image for {}", key);
                    return Completion::Stale(key);
                }
                let revised = image
                    .revised_prompt
                    .filter(|prompt| !prompt.trim().is_empty())
                    .unwrap_or(request.prompt);
                let written = store.set_image_result(
                    &request.session_name,
                    request.scene_index,
                    &image.url,
                    &revised,
                );
                if written {
                    tracing::info!("[ImageDispatcher] image ready for {}: {}", key, image.url);
                    Completion::Applied(key)
                } else {
                    tracing::warn!("[ImageDispatcher] {} no longer in store; dropped image", key);
                    Completion::Stale(key)
                }
            }
            Err(err) if !session_active => {
                tracing::debug!("[ImageDispatcher] ignored failure for inactive {}: {}", key, err);
                Completion::Stale(key)
            }
            Err(err) => {
                tracing::warn!("[ImageDispatcher] image request for {} failed: {}", key, err);
                Completion::Failed {
                    key,
                    reason: err.status_text(),
                }
            }
        }
    }
}

//! Reconciliation of incoming snapshots against rendered state.
//!
//! For every snapshot the reconciler:
//! 1. merges it into the [`SnapshotStore`]
//! 2. switches the rendered session when the active session changed
//! 3. decides which scenes need a new image request
//! 4. computes the minimal set of scenes to re-render
//!
//! Everything happens synchronously while one event is handled, so the
//! request ledger is updated before the next snapshot can be seen.

use crate::backend::ImageRequest;
use crate::requests::Dispatch;
use crate::scene::{SceneKey, Snapshot};
use crate::store::SnapshotStore;
use crate::view::SceneView;
use std::collections::{BTreeMap, BTreeSet};

/// Actions resulting from one reconciliation step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// The rendered session was replaced; previously rendered scenes must go.
    pub cleared: bool,
    pub active_session: Option<String>,
    /// Scenes whose presentation changed, in index order.
    pub renders: Vec<SceneView>,
    /// Image requests to dispatch, already recorded as outstanding.
    pub requests: Vec<ImageRequest>,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        !self.cleared && self.renders.is_empty() && self.requests.is_empty()
    }
}

/// Holds the rendered view state of the active session.
#[derive(Debug, Default)]
pub struct Reconciler {
    rendered_session: Option<String>,
    rendered: BTreeMap<usize, SceneView>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one snapshot.
    pub fn reconcile(&mut self, store: &mut SnapshotStore, snapshot: &Snapshot) -> Reconciliation {
        let diff = store.apply(snapshot);
        let Some(active) = store.active_session_name().map(str::to_string) else {
            return Reconciliation::default();
        };

        let mut outcome = Reconciliation {
            cleared: self.adopt(&active),
            active_session: Some(active.clone()),
            ..Reconciliation::default()
        };

        if let Some(session_diff) = diff.session(&active) {
            let mut candidates: BTreeSet<usize> = session_diff.changed.clone();
            candidates.extend(store.requests_mut().take_retries(&active));

            for index in candidates {
                if let Some(request) = request_for(store, &active, index) {
                    tracing::debug!(
                        "[Reconciler] dispatching image for {}#{}: {}",
                        active,
                        index,
                        request.prompt
                    );
                    outcome.requests.push(request);
                }
            }
        }

        outcome.renders = self.render_changes(store);
        outcome
    }

    /// Recomputes presentation without merging anything (after an image
    /// result landed in the store).
    pub fn refresh(&mut self, store: &SnapshotStore) -> Reconciliation {
        let Some(active) = store.active_session_name().map(str::to_string) else {
            return Reconciliation::default();
        };
        Reconciliation {
            cleared: self.adopt(&active),
            active_session: Some(active),
            renders: self.render_changes(store),
            requests: Vec::new(),
        }
    }

    /// Manual re-generation of one scene of the active session.
    ///
    /// With `prompt_override` the scene's prompt is replaced first. The
    /// already-requested check is bypassed, the one-outstanding-per-scene
    /// rule is not.
    pub fn regenerate(
        &mut self,
        store: &mut SnapshotStore,
        index: usize,
        prompt_override: Option<&str>,
    ) -> Option<ImageRequest> {
        let session = store.active_session_name()?.to_string();
        if let Some(prompt) = prompt_override {
            if !store.edit_prompt(&session, index, prompt) {
                return None;
            }
        }

        let prompt = store
            .session(&session)?
            .scene(index)?
            .defined_prompt()?
            .to_string();
        let key = SceneKey::new(&session, index);
        match store.requests_mut().begin(&key, &prompt, true) {
            Dispatch::Now => Some(ImageRequest {
                prompt,
                session_name: session,
                scene_index: index,
            }),
            Dispatch::Deferred | Dispatch::Skip => {
                tracing::debug!("[Reconciler] regenerate for {} suppressed", key);
                None
            }
        }
    }

    /// Forgets all rendered state (new stream).
    pub fn reset(&mut self) {
        self.rendered_session = None;
        self.rendered.clear();
    }

    pub fn rendered(&self) -> impl Iterator<Item = &SceneView> {
        self.rendered.values()
    }

    /// Makes `active` the rendered session. Returns true when a different
    /// session was rendered before.
    fn adopt(&mut self, active: &str) -> bool {
        if self.rendered_session.as_deref() == Some(active) {
            return false;
        }
        let had_previous = self.rendered_session.is_some();
        if had_previous {
            tracing::info!(
                "[Reconciler] session switched from {:?} to {}",
                self.rendered_session,
                active
            );
        }
        self.rendered.clear();
        self.rendered_session = Some(active.to_string());
        had_previous
    }

    fn render_changes(&mut self, store: &SnapshotStore) -> Vec<SceneView> {
        let Some(session) = store.active_session() else {
            return Vec::new();
        };

        let mut renders = Vec::new();
        for (index, scene) in session.scenes.iter().enumerate() {
            let view = SceneView::from_scene(index, scene);
            if self.rendered.get(&index) != Some(&view) {
                self.rendered.insert(index, view.clone());
                renders.push(view);
            }
        }
        renders
    }
}

fn request_for(store: &mut SnapshotStore, session: &str, index: usize) -> Option<ImageRequest> {
    let prompt = store
        .session(session)?
        .scene(index)?
        .defined_prompt()?
        .to_string();
    let key = SceneKey::new(session, index);

    match store.requests_mut().begin(&key, &prompt, false) {
        Dispatch::Now => Some(ImageRequest {
            prompt,
            session_name: session.to_string(),
            scene_index: index,
        }),
        Dispatch::Deferred => {
            tracing::debug!("[Reconciler] prompt for {} deferred behind outstanding request", key);
            None
        }
        Dispatch::Skip => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneRecord, UNDEFINED_PROMPT};

    fn story(records: Vec<SceneRecord>) -> Snapshot {
        Snapshot::single("story", records)
    }

    fn prompts(outcome: &Reconciliation) -> Vec<(usize, &str)> {
        outcome
            .requests
            .iter()
            .map(|r| (r.scene_index, r.prompt.as_str()))
            .collect()
    }

    #[test]
    fn test_streamed_scenes_request_each_prompt_once() {
        let mut store = SnapshotStore::new();
        let mut reconciler = Reconciler::new();

        let first = reconciler.reconcile(&mut store, &story(vec![SceneRecord::new("d1", "p1")]));
        assert_eq!(prompts(&first), vec![(0, "p1")]);
        assert_eq!(first.renders.len(), 1);

        let second = reconciler.reconcile(
            &mut store,
            &story(vec![SceneRecord::new("d1", "p1"), SceneRecord::new("d2", "p2")]),
        );
        assert_eq!(prompts(&second), vec![(1, "p2")]);
        assert_eq!(second.renders.len(), 1);
        assert_eq!(second.renders[0].index, 1);
    }

    #[test]
    fn test_same_snapshot_twice_is_idempotent() {
        let mut store = SnapshotStore::new();
        let mut reconciler = Reconciler::new();
        let snapshot = story(vec![SceneRecord::new("d1", "p1")]);

        reconciler.reconcile(&mut store, &snapshot);
        let again = reconciler.reconcile(&mut store, &snapshot);
        assert!(again.is_noop());
    }

    #[test]
    fn test_placeholder_prompt_does_not_request() {
        let mut store = SnapshotStore::new();
        let mut reconciler = Reconciler::new();
        let outcome = reconciler.reconcile(
            &mut store,
            &story(vec![SceneRecord::new("d1", UNDEFINED_PROMPT)]),
        );
        assert!(outcome.requests.is_empty());
        assert_eq!(outcome.renders.len(), 1);
    }

    #[test]
    fn test_description_growth_rerenders_without_request() {
        let mut store = SnapshotStore::new();
        let mut reconciler = Reconciler::new();
        reconciler.reconcile(&mut store, &story(vec![SceneRecord::new("a", "p1")]));
        let outcome =
            reconciler.reconcile(&mut store, &story(vec![SceneRecord::new("a cat", "p1")]));
        assert!(outcome.requests.is_empty());
        assert_eq!(outcome.renders[0].description, "a cat");
    }

    #[test]
    fn test_prompt_change_requests_once() {
        let mut store = SnapshotStore::new();
        let mut reconciler = Reconciler::new();
        reconciler.reconcile(&mut store, &story(vec![SceneRecord::new("d", "a")]));
        store.requests_mut().finish(&SceneKey::new("story", 0), "a", true);

        let changed = reconciler.reconcile(&mut store, &story(vec![SceneRecord::new("d", "b")]));
        assert_eq!(prompts(&changed), vec![(0, "b")]);

        let repeated = reconciler.reconcile(&mut store, &story(vec![SceneRecord::new("d", "b")]));
        assert!(repeated.requests.is_empty());

        let flapped = reconciler.reconcile(&mut store, &story(vec![SceneRecord::new("d", "a")]));
        assert!(flapped.requests.is_empty());
    }

    #[test]
    fn test_session_switch_clears_rendered_state() {
        let mut store = SnapshotStore::new();
        let mut reconciler = Reconciler::new();
        reconciler.reconcile(&mut store, &Snapshot::single("s1", vec![SceneRecord::new("d", "p")]));

        let outcome = reconciler.reconcile(
            &mut store,
            &Snapshot::single("s2", vec![SceneRecord::new("d", "p")]),
        );
        assert!(outcome.cleared);
        assert_eq!(outcome.active_session.as_deref(), Some("s2"));
        assert_eq!(outcome.renders.len(), 1);
        // Same prompt, different session: a separate request.
        assert_eq!(prompts(&outcome), vec![(0, "p")]);
        assert_eq!(reconciler.rendered().count(), 1);
    }

    #[test]
    fn test_failed_request_is_retried_on_next_snapshot() {
        let mut store = SnapshotStore::new();
        let mut reconciler = Reconciler::new();
        let snapshot = story(vec![SceneRecord::new("d", "p")]);
        reconciler.reconcile(&mut store, &snapshot);
        store.requests_mut().finish(&SceneKey::new("story", 0), "p", false);

        let retry = reconciler.reconcile(&mut store, &snapshot);
        assert_eq!(prompts(&retry), vec![(0, "p")]);
    }

    #[test]
    fn test_refresh_renders_image_result() {
        let mut store = SnapshotStore::new();
        let mut reconciler = Reconciler::new();
        reconciler.reconcile(&mut store, &story(vec![SceneRecord::new("d", "p")]));
        store.set_image_result("story", 0, "http://h/x.png", "p");

        let outcome = reconciler.refresh(&store);
        assert_eq!(outcome.renders.len(), 1);
        assert_eq!(outcome.renders[0].image_src.as_deref(), Some("http://h/x.png"));
        assert!(reconciler.refresh(&store).is_noop());
    }

    #[test]
    fn test_regenerate_uses_override_prompt() {
        let mut store = SnapshotStore::new();
        let mut reconciler = Reconciler::new();
        reconciler.reconcile(&mut store, &story(vec![SceneRecord::new("d", "p")]));
        store.requests_mut().finish(&SceneKey::new("story", 0), "p", true);

        let request = reconciler
            .regenerate(&mut store, 0, Some("a sharper p"))
            .expect("regenerate should dispatch");
        assert_eq!(request.prompt, "a sharper p");
        assert!(reconciler.regenerate(&mut store, 0, None).is_none());
        assert!(reconciler.regenerate(&mut store, 9, None).is_none());
    }
}

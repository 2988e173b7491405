//! Snapshot store: the latest known state of every session in the current stream.

use crate::requests::ImageRequestState;
use crate::scene::{
    Scene, SceneImage, SceneKey, SceneRecord, Session, Snapshot, StoryDocument,
};
use std::collections::BTreeSet;

/// Changes a snapshot made to one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDiff {
    pub name: String,
    pub is_new: bool,
    /// Indices whose description, prompt or image changed.
    pub changed: BTreeSet<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreDiff {
    pub sessions: Vec<SessionDiff>,
}

impl StoreDiff {
    pub fn session(&self, name: &str) -> Option<&SessionDiff> {
        self.sessions.iter().find(|diff| diff.name == name)
    }

    pub fn is_unchanged(&self) -> bool {
        self.sessions
            .iter()
            .all(|diff| !diff.is_new && diff.changed.is_empty())
    }
}

/// Owned client state for one stream.
///
/// Constructed per stream and reset explicitly when a new generation starts.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    sessions: Vec<Session>,
    active: Option<String>,
    requests: ImageRequestState,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one snapshot and reports what changed.
    ///
    /// The last session named in the snapshot becomes active. An empty
    /// snapshot changes nothing.
    pub fn apply(&mut self, snapshot: &Snapshot) -> StoreDiff {
        let mut diff = StoreDiff::default();
        for (name, records) in &snapshot.sessions {
            diff.sessions.push(self.merge_session(name, records));
            self.active = Some(name.clone());
        }
        diff
    }

    fn merge_session(&mut self, name: &str, records: &[SceneRecord]) -> SessionDiff {
        let (position, is_new) = match self.sessions.iter().position(|s| s.name == name) {
            Some(position) => (position, false),
            None => {
                self.sessions.push(Session::new(name));
                (self.sessions.len() - 1, true)
            }
        };

        let Self {
            sessions, requests, ..
        } = self;
        let session = &mut sessions[position];

        let mut changed = BTreeSet::new();
        for (index, record) in records.iter().enumerate() {
            let appended = index >= session.scenes.len();
            if appended {
                session.scenes.push(Scene::default());
            }
            let key = SceneKey::new(name, index);
            if merge_scene(&mut session.scenes[index], record, &key, requests) || appended {
                changed.insert(index);
            }
        }

        SessionDiff {
            name: name.to_string(),
            is_new,
            changed,
        }
    }

    pub fn active_session(&self) -> Option<&Session> {
        let name = self.active.as_deref()?;
        self.session(name)
    }

    pub fn active_session_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn session(&self, name: &str) -> Option<&Session> {
        self.sessions.iter().find(|session| session.name == name)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Stores a confirmed image returned by the image endpoint.
    ///
    /// Does nothing and returns false unless `session` is still the active
    /// session and `index` is within range.
    pub fn set_image_result(
        &mut self,
        session: &str,
        index: usize,
        url: &str,
        revised_prompt: &str,
    ) -> bool {
        if self.active.as_deref() != Some(session) {
            return false;
        }
        let Some(scene) = self
            .sessions
            .iter_mut()
            .find(|s| s.name == session)
            .and_then(|s| s.scenes.get_mut(index))
        else {
            return false;
        };

        scene.image = Some(SceneImage::new(url, revised_prompt));
        scene.image_prompt = Some(revised_prompt.to_string());
        self.requests
            .record_completed(&SceneKey::new(session, index), revised_prompt);
        true
    }

    /// Replaces a scene's prompt with user-entered text.
    pub fn edit_prompt(&mut self, session: &str, index: usize, prompt: &str) -> bool {
        match self
            .sessions
            .iter_mut()
            .find(|s| s.name == session)
            .and_then(|s| s.scenes.get_mut(index))
        {
            Some(scene) => {
                scene.image_prompt = Some(prompt.to_string());
                true
            }
            None => false,
        }
    }

    pub fn requests(&self) -> &ImageRequestState {
        &self.requests
    }

    pub fn requests_mut(&mut self) -> &mut ImageRequestState {
        &mut self.requests
    }

    /// Drops every session and all request state.
    pub fn reset(&mut self) {
        self.sessions.clear();
        self.active = None;
        self.requests.clear();
    }

    /// Serializable form of every stored session.
    pub fn to_document(&self) -> StoryDocument {
        let mut document = StoryDocument::default();
        for session in &self.sessions {
            let scenes = session
                .scenes
                .iter()
                .map(|scene| SceneRecord {
                    description: scene.description.clone(),
                    image_prompt: scene.image_prompt.clone(),
                    scene_image: scene.image.as_ref().map(|image| image.url.clone()),
                })
                .collect();
            document.stories.insert(session.name.clone(), scenes);
        }
        document
    }
}

/// Applies one incoming record to a stored scene. Returns true on change.
///
/// A confirmed image, and the prompt that produced it, survive any record
/// that does not carry a different confirmed image.
fn merge_scene(
    stored: &mut Scene,
    record: &SceneRecord,
    key: &SceneKey,
    requests: &mut ImageRequestState,
) -> bool {
    let new_image = record
        .scene_image
        .as_deref()
        .filter(|url| SceneImage::is_remote_url(url))
        .filter(|url| stored.image.as_ref().map(|image| image.url.as_str()) != Some(*url));
    let preserve = stored.has_confirmed_image() && new_image.is_none();

    let mut changed = false;

    if let Some(description) = &record.description {
        if stored.description.as_ref() != Some(description) {
            stored.description = Some(description.clone());
            changed = true;
        }
    }

    if !preserve {
        if let Some(prompt) = &record.image_prompt {
            if stored.image_prompt.as_ref() != Some(prompt) {
                stored.image_prompt = Some(prompt.clone());
                changed = true;
            }
        }
    }

    if let Some(url) = new_image {
        let alt = stored.image_prompt.clone().unwrap_or_default();
        if let Some(prompt) = stored.defined_prompt() {
            requests.record_completed(key, prompt);
        }
        stored.image = Some(SceneImage::new(url, alt));
        changed = true;
    }

    changed
}

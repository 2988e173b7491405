use super::snapshot::SceneRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized store contents: story name to scenes.
///
/// This is the body of a save request and the layout of `storylines.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryDocument {
    pub stories: BTreeMap<String, Vec<SceneRecord>>,
}

impl StoryDocument {
    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    /// Copies every story from `other`, replacing same-named stories.
    pub fn merge_from(&mut self, other: &StoryDocument) {
        for (name, scenes) in &other.stories {
            self.stories.insert(name.clone(), scenes.clone());
        }
    }
}

use crate::error::{Result, StoryboardError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One scene entry as it travels over the wire.
///
/// Used both for incoming snapshots and for the saved document. Absent or
/// `null` fields mean "not specified" and leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_image: Option<String>,
}

impl SceneRecord {
    pub fn new(description: impl Into<String>, image_prompt: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            image_prompt: Some(image_prompt.into()),
            scene_image: None,
        }
    }
}

/// A cumulative backend update: session name to its full current scene list.
///
/// Session order follows the order of keys in the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub sessions: Vec<(String, Vec<SceneRecord>)>,
}

impl Snapshot {
    pub fn single(name: impl Into<String>, scenes: Vec<SceneRecord>) -> Self {
        Self {
            sessions: vec![(name.into(), scenes)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Parses a decoded event payload.
    ///
    /// The payload must be an object whose values are arrays of objects.
    /// Anything else is a decode error for this event only.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(StoryboardError::decode(
                truncate(&value.to_string()),
                "snapshot payload is not a JSON object",
            ));
        };

        let mut sessions = Vec::with_capacity(map.len());
        for (name, scenes) in map {
            let Value::Array(items) = scenes else {
                return Err(StoryboardError::decode(
                    truncate(&scenes.to_string()),
                    format!("scenes for '{}' are not an array", name),
                ));
            };

            let mut records = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                if !item.is_object() {
                    return Err(StoryboardError::decode(
                        truncate(&item.to_string()),
                        format!("scene {} of '{}' is not an object", index, name),
                    ));
                }
                let segment = truncate(&item.to_string());
                let record: SceneRecord = serde_json::from_value(item).map_err(|err| {
                    StoryboardError::decode(
                        segment,
                        format!("scene {} of '{}': {}", index, name, err),
                    )
                })?;
                records.push(record);
            }
            sessions.push((name, records));
        }

        Ok(Self { sessions })
    }
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.len() <= LIMIT {
        return text.to_string();
    }
    let mut end = LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

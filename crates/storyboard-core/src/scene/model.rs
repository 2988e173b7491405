use serde::{Deserialize, Serialize};

/// Literal the generator (and the browser client before it) uses for a prompt
/// that has not been produced yet.
pub const UNDEFINED_PROMPT: &str = "undefined";

/// Returns true when `prompt` is usable for an image request.
pub fn is_defined_prompt(prompt: &str) -> bool {
    let trimmed = prompt.trim();
    !trimmed.is_empty() && trimmed != UNDEFINED_PROMPT
}

/// A server-confirmed image for a scene.
///
/// Only URLs returned by the image endpoint, or absolute URLs carried by a
/// snapshot, are ever stored; placeholders never become a `SceneImage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneImage {
    pub url: String,
    /// Caption shown with the image; the provider's revised prompt when there is one.
    pub alt: String,
}

impl SceneImage {
    pub fn new(url: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt: alt.into(),
        }
    }

    /// Absolute `http(s)` URLs are real images; anything else in a snapshot is
    /// a placeholder path invented by the text model.
    pub fn is_remote_url(url: &str) -> bool {
        let lower = url.trim_start().to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }
}

/// One ordered element of a session. Identity is its index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scene {
    pub description: Option<String>,
    pub image_prompt: Option<String>,
    pub image: Option<SceneImage>,
}

impl Scene {
    pub fn has_confirmed_image(&self) -> bool {
        self.image.is_some()
    }

    /// The prompt, if it is defined (see [`is_defined_prompt`]).
    pub fn defined_prompt(&self) -> Option<&str> {
        self.image_prompt
            .as_deref()
            .filter(|prompt| is_defined_prompt(prompt))
    }
}

/// A named generation request and its ordered scenes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub scenes: Vec<Scene>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenes: Vec::new(),
        }
    }

    pub fn scene(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }
}

/// Identifies a scene across session switches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneKey {
    pub session: String,
    pub index: usize,
}

impl SceneKey {
    pub fn new(session: impl Into<String>, index: usize) -> Self {
        Self {
            session: session.into(),
            index,
        }
    }
}

impl std::fmt::Display for SceneKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.session, self.index)
    }
}

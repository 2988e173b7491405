//! Presentation model and the presenter seam.

use crate::scene::Scene;
use serde::Serialize;

/// What a scene looks like on screen.
///
/// Re-render decisions compare these structurally; rendering never touches
/// request state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SceneView {
    pub index: usize,
    pub description: String,
    pub prompt: String,
    pub image_src: Option<String>,
    pub image_alt: Option<String>,
}

impl SceneView {
    pub fn from_scene(index: usize, scene: &Scene) -> Self {
        Self {
            index,
            description: scene.description.clone().unwrap_or_default(),
            prompt: scene.image_prompt.clone().unwrap_or_default(),
            image_src: scene.image.as_ref().map(|image| image.url.clone()),
            image_alt: scene.image.as_ref().map(|image| image.alt.clone()),
        }
    }
}

/// User-visible status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Status {
    Idle,
    Loading,
    Streaming,
    Saving,
    Saved,
    SaveFailed(String),
    Failed(String),
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Idle => write!(f, "idle"),
            Status::Loading => write!(f, "loading"),
            Status::Streaming => write!(f, "streaming"),
            Status::Saving => write!(f, "saving"),
            Status::Saved => write!(f, "saved"),
            Status::SaveFailed(reason) => write!(f, "could not save: {}", reason),
            Status::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Output side of the client (terminal, GUI, test recorder).
pub trait Presenter: Send {
    /// Drops every rendered scene (session switch or new stream).
    fn clear(&mut self);

    fn render_scene(&mut self, session: &str, view: &SceneView);

    fn show_status(&mut self, status: &Status);
}

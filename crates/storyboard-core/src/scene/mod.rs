//! Scene domain module.
//!
//! # Module Structure
//!
//! - `model`: stored domain types (`Scene`, `SceneImage`, `Session`, `SceneKey`)
//! - `snapshot`: one decoded backend update (`Snapshot`, `SceneRecord`)
//! - `document`: the serialized form sent to persistence (`StoryDocument`)

mod document;
mod model;
mod snapshot;

pub use document::StoryDocument;
pub use model::{Scene, SceneImage, SceneKey, Session, UNDEFINED_PROMPT, is_defined_prompt};
pub use snapshot::{SceneRecord, Snapshot};

//! Domain core of the Storyboard client.
//!
//! Holds the scene model, the snapshot store, the per-scene image request
//! ledger and the reconciler. Nothing in this crate performs I/O; the
//! collaborators it talks to are described by the traits in [`backend`].

pub mod backend;
pub mod config;
pub mod error;
pub mod reconciler;
pub mod requests;
pub mod scene;
pub mod store;
pub mod view;

// Re-export common types
pub use backend::{ByteStream, ImageGenerator, ImageRequest, ImageResult, PromptStream, StorylineSink};
pub use error::{Result, StoryboardError};
pub use reconciler::{Reconciler, Reconciliation};
pub use requests::{Dispatch, Finish, ImageRequestState};
pub use scene::{Scene, SceneImage, SceneKey, SceneRecord, Session, Snapshot, StoryDocument};
pub use store::{SessionDiff, SnapshotStore, StoreDiff};
pub use view::{Presenter, SceneView, Status};

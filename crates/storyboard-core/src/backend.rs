//! External collaborator interfaces.
//!
//! The generation backend, the image provider and the storage are reached
//! only through these traits, decoupling the reconciliation logic from the
//! transport (HTTP, local files, in-memory fakes).

use crate::error::Result;
use crate::scene::StoryDocument;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Raw bytes of an open event stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// One image request for one scene of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub prompt: String,
    pub session_name: String,
    pub scene_index: usize,
}

/// A successful image generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub url: String,
    /// The prompt as rewritten by the provider, when it rewrote it.
    pub revised_prompt: Option<String>,
}

/// Opens the content-driven generation stream.
#[async_trait]
pub trait PromptStream: Send + Sync {
    /// Starts a generation for `content` and returns its event bytes.
    ///
    /// # Returns
    ///
    /// - `Ok(ByteStream)`: the response body; ends when the server closes it
    /// - `Err(_)`: the stream could not be opened (transport error)
    async fn open_stream(&self, content: &str) -> Result<ByteStream>;
}

/// Generates the image for one scene.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// # Returns
    ///
    /// - `Ok(ImageResult)`: the provider produced an image
    /// - `Err(StoryboardError::Rejected { .. })`: the endpoint answered `success: false`
    /// - `Err(_)`: transport or parse failure
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResult>;
}

/// Persists the serialized store.
#[async_trait]
pub trait StorylineSink: Send + Sync {
    async fn save(&self, document: &StoryDocument) -> Result<()>;
}

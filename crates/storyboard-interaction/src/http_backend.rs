//! HttpBackend - the generation server reached over plain HTTP.
//!
//! One client implements all three collaborators: the event stream, the
//! image endpoint and the persistence endpoint.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode, Url, header};
use serde::Deserialize;
use std::time::Duration;
use storyboard_core::config::ClientConfig;
use storyboard_core::{
    ByteStream, ImageGenerator, ImageRequest, ImageResult, PromptStream, Result, StoryDocument,
    StoryboardError, StorylineSink,
};

const IMAGE_ENDPOINT: &str = "generate_image";
const SAVE_ENDPOINT: &str = "save";

/// HTTP implementation of the collaborator traits.
#[derive(Clone)]
pub struct HttpBackend {
    /// No overall timeout: a stream lasts as long as generation does.
    stream_client: Client,
    request_client: Client,
    base: Url,
    stream_url: Url,
    image_url: Url,
    save_url: Url,
}

impl HttpBackend {
    /// Builds the clients and resolves every endpoint against `server_url`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.server_url).map_err(|err| {
            StoryboardError::config(format!("invalid server_url '{}': {}", config.server_url, err))
        })?;
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);

        let stream_client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| StoryboardError::config(format!("HTTP client: {}", err)))?;
        let request_client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| StoryboardError::config(format!("HTTP client: {}", err)))?;

        Ok(Self {
            stream_client,
            request_client,
            stream_url: join(&base, &config.stream_path)?,
            image_url: join(&base, &config.image_path)?,
            save_url: join(&base, &config.save_path)?,
            base,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Makes a server-relative image path absolute.
    pub fn resolve_image_url(&self, url: &str) -> String {
        resolve_against(&self.base, url)
    }
}

#[async_trait]
impl PromptStream for HttpBackend {
    async fn open_stream(&self, content: &str) -> Result<ByteStream> {
        tracing::info!("[HttpBackend] opening stream at {}", self.stream_url);
        let response = self
            .stream_client
            .get(self.stream_url.clone())
            .query(&[("content", content)])
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| map_send_error("prompt stream", err))?;
        let response = ensure_success(response).await?;

        let bytes = response.bytes_stream().map(|chunk| {
            chunk.map_err(|err| {
                StoryboardError::transport(format!("prompt stream interrupted: {}", err))
            })
        });
        Ok(Box::pin(bytes))
    }
}

#[async_trait]
impl ImageGenerator for HttpBackend {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResult> {
        let scene_index = request.scene_index.to_string();
        let response = self
            .request_client
            .get(self.image_url.clone())
            .query(&[
                ("prompt", request.prompt.as_str()),
                ("gen_name", request.session_name.as_str()),
                ("scene_index", scene_index.as_str()),
            ])
            .send()
            .await
            .map_err(|err| map_send_error(IMAGE_ENDPOINT, err))?;
        let response = ensure_success(response).await?;

        let body: ImageResponseBody = response.json().await.map_err(|err| {
            StoryboardError::Serialization {
                format: "JSON".to_string(),
                message: format!("image response: {}", err),
            }
        })?;
        image_result_from(body, &self.base)
    }
}

#[async_trait]
impl StorylineSink for HttpBackend {
    async fn save(&self, document: &StoryDocument) -> Result<()> {
        let content = serde_json::to_string(document)?;
        let response = self
            .request_client
            .get(self.save_url.clone())
            .query(&[("content", content.as_str())])
            .send()
            .await
            .map_err(|err| map_send_error(SAVE_ENDPOINT, err))?;
        let response = ensure_success(response).await?;

        let body: SaveResponseBody = response.json().await.map_err(|err| {
            StoryboardError::Serialization {
                format: "JSON".to_string(),
                message: format!("save response: {}", err),
            }
        })?;
        if body.success {
            Ok(())
        } else {
            Err(StoryboardError::rejected(
                SAVE_ENDPOINT,
                body.detail.unwrap_or_else(|| "success: false".to_string()),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageResponseBody {
    success: bool,
    url: Option<String>,
    #[serde(alias = "revisedPrompt")]
    revised_prompt: Option<String>,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SaveResponseBody {
    success: bool,
    detail: Option<String>,
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

fn image_result_from(body: ImageResponseBody, base: &Url) -> Result<ImageResult> {
    if !body.success {
        return Err(StoryboardError::rejected(
            IMAGE_ENDPOINT,
            body.detail.unwrap_or_else(|| "success: false".to_string()),
        ));
    }
    let url = body
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| StoryboardError::rejected(IMAGE_ENDPOINT, "response carried no url"))?;

    Ok(ImageResult {
        url: resolve_against(base, &url),
        revised_prompt: body.revised_prompt.filter(|p| !p.trim().is_empty()),
    })
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path).map_err(|err| {
        StoryboardError::config(format!("invalid endpoint path '{}': {}", path, err))
    })
}

fn resolve_against(base: &Url, url: &str) -> String {
    match base.join(url) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => url.to_string(),
    }
}

fn map_send_error(endpoint: &str, err: reqwest::Error) -> StoryboardError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "could not connect"
    } else {
        "failed"
    };
    StoryboardError::transport(format!("{} request {}: {}", endpoint, kind, err))
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    Err(map_http_error(status, body))
}

fn map_http_error(status: StatusCode, body: String) -> StoryboardError {
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|wrapper| match wrapper.detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        })
        .unwrap_or(body);
    StoryboardError::http_status(status.as_u16(), message)
}

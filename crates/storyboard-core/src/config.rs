use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8001";

/// Client configuration, read from `config.toml`.
///
/// Every field has a default so a partial (or missing) file is valid.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the generation server.
    pub server_url: String,
    /// Path of the streaming prompt endpoint.
    pub stream_path: String,
    /// Path of the image generation endpoint.
    pub image_path: String,
    /// Path of the persistence endpoint.
    pub save_path: String,
    /// Timeout for image and save requests. The stream itself is unbounded.
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// When set, `save` writes to this local file instead of the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storylines_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            stream_path: "/generate_prompts".to_string(),
            image_path: "/generate_image".to_string(),
            save_path: "/save".to_string(),
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            storylines_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ClientConfig = toml::from_str(r#"server_url = "http://story.local:9000""#)
            .expect("partial config should parse");
        assert_eq!(config.server_url, "http://story.local:9000");
        assert_eq!(config.stream_path, "/generate_prompts");
        assert_eq!(config.request_timeout_secs, 120);
        assert!(config.storylines_file.is_none());
    }
}

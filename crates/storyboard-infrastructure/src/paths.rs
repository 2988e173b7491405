//! Path management for storyboard files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/storyboard/        # Config directory
//! └── config.toml              # Client configuration
//!
//! ~/.local/share/storyboard/   # Data directory
//! ├── storylines.json          # Locally saved stories
//! └── logs/                    # Rolling log files
//!     └── storyboard.log.YYYY-MM-DD
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "storyboard";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Platform paths (XDG on Linux, the platform equivalents elsewhere).
pub struct StoryboardPaths;

impl StoryboardPaths {
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Default target of local saves.
    pub fn storylines_file() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("storylines.json"))
    }

    pub fn logs_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("logs"))
    }
}

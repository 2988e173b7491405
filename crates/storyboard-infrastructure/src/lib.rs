pub mod config_service;
pub mod json_storyline_repository;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::json_storyline_repository::JsonStorylineRepository;
pub use crate::paths::{PathError, StoryboardPaths};

use anyhow::{Context, Result};
use std::path::PathBuf;
use storyboard_infrastructure::ConfigService;

pub fn run(config_path: Option<PathBuf>) -> Result<()> {
    let service = match config_path {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new(),
    };
    let config = service.get_config()?;
    let rendered = toml::to_string_pretty(&config).context("failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

use crate::terminal_presenter::TerminalPresenter;
use anyhow::{Result, bail};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use storyboard_application::SessionController;
use storyboard_core::backend::StorylineSink;
use storyboard_core::view::Status;
use storyboard_infrastructure::{ConfigService, JsonStorylineRepository};
use storyboard_interaction::HttpBackend;

pub struct Options {
    pub content: String,
    pub server: Option<String>,
    pub save: bool,
    pub storylines: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

pub async fn run(options: Options) -> Result<()> {
    let service = match &options.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new(),
    };
    let mut config = service.get_config()?;
    if let Some(server) = options.server {
        config.server_url = server;
    }
    if let Some(path) = options.storylines {
        config.storylines_file = Some(path);
    }

    let backend = Arc::new(HttpBackend::new(&config)?);
    let sink: Arc<dyn StorylineSink> = match &config.storylines_file {
        Some(path) => Arc::new(JsonStorylineRepository::with_path(path)),
        None => backend.clone(),
    };
    tracing::info!("[generate] server {}", backend.base_url());

    let mut controller = SessionController::new(
        backend.clone(),
        backend,
        sink,
        TerminalPresenter,
    );

    let summary = controller.start(&options.content).await?;
    println!(
        "{}",
        format!(
            "{} event(s), {} image request(s), {} image(s) applied",
            summary.events, summary.requests, summary.images_applied
        )
        .dimmed()
    );
    if summary.failed_requests > 0 || summary.decode_errors > 0 {
        eprintln!(
            "{}",
            format!(
                "{} failed image request(s), {} undecodable event(s)",
                summary.failed_requests, summary.decode_errors
            )
            .yellow()
        );
    }

    if options.save {
        if let Status::SaveFailed(reason) = controller.save().await {
            bail!("could not save: {}", reason);
        }
    }

    Ok(())
}

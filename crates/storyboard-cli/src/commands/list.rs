use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use storyboard_infrastructure::JsonStorylineRepository;

pub fn run(storylines: Option<PathBuf>) -> Result<()> {
    let repository = match storylines {
        Some(path) => JsonStorylineRepository::with_path(path),
        None => JsonStorylineRepository::new()?,
    };
    let document = repository.load_all()?;

    if document.is_empty() {
        println!("No saved stories in {}", repository.path().display());
        return Ok(());
    }

    for (name, scenes) in &document.stories {
        let illustrated = scenes.iter().filter(|scene| scene.scene_image.is_some()).count();
        println!(
            "{}  {} scene(s), {} illustrated",
            name.cyan().bold(),
            scenes.len(),
            illustrated
        );
    }
    Ok(())
}

use colored::Colorize;
use storyboard_core::view::{Presenter, SceneView, Status};

/// Prints scenes to stdout as they change; status goes to stderr.
///
/// A terminal cannot redraw a scene in place, so every update is printed
/// again with its index.
#[derive(Default)]
pub struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn clear(&mut self) {
        println!("{}", "--".dimmed());
    }

    fn render_scene(&mut self, session: &str, view: &SceneView) {
        println!("{}", format_scene(session, view));
    }

    fn show_status(&mut self, status: &Status) {
        let label = status.to_string();
        let label = match status {
            Status::Failed(_) | Status::SaveFailed(_) => label.red(),
            Status::Saved => label.green(),
            _ => label.yellow(),
        };
        eprintln!("[{}]", label);
    }
}

fn format_scene(session: &str, view: &SceneView) -> String {
    let mut lines = vec![format!(
        "{} {}",
        format!("[{} #{}]", session, view.index).cyan().bold(),
        view.description
    )];
    if !view.prompt.is_empty() {
        lines.push(format!("    {} {}", "prompt:".dimmed(), view.prompt));
    }
    if let Some(src) = &view.image_src {
        lines.push(format!("    {} {}", "image:".dimmed(), src.green()));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_lines() {
        colored::control::set_override(false);
        let view = SceneView {
            index: 1,
            description: "a cat on a roof".to_string(),
            prompt: "a cat on a roof, 3d".to_string(),
            image_src: Some("http://img/cats/1.png".to_string()),
            image_alt: Some("a cat on a roof, 3d".to_string()),
        };
        assert_eq!(
            format_scene("cats", &view),
            "[cats #1] a cat on a roof\n    prompt: a cat on a roof, 3d\n    image: http://img/cats/1.png"
        );

        let bare = SceneView {
            index: 0,
            description: "dawn".to_string(),
            ..SceneView::default()
        };
        assert_eq!(format_scene("cats", &bare), "[cats #0] dawn");
    }
}

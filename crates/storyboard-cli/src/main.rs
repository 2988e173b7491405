use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;
mod terminal_presenter;

#[derive(Parser)]
#[command(name = "storyboard")]
#[command(about = "Storyboard - stream scenes from a story and illustrate them", long_about = None)]
struct Cli {
    /// Log filter: a level (`debug`) or a full directive (`storyboard_core=trace`)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate scenes for a story and request their images
    Generate {
        /// Story text sent to the server
        content: String,

        /// Server base URL (overrides config and STORYBOARD_SERVER_URL)
        #[arg(long)]
        server: Option<String>,

        /// Save the result when the stream ends
        #[arg(long)]
        save: bool,

        /// Save into this local JSON file instead of the server
        #[arg(long)]
        storylines: Option<PathBuf>,
    },
    /// List locally saved stories
    List {
        /// Storylines file (defaults to the platform data directory)
        #[arg(long)]
        storylines: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_level.as_deref())?;

    match cli.command {
        Commands::Generate {
            content,
            server,
            save,
            storylines,
        } => {
            let options = commands::generate::Options {
                content,
                server,
                save,
                storylines,
                config: cli.config,
            };
            commands::generate::run(options).await?
        }
        Commands::List { storylines } => commands::list::run(storylines)?,
        Commands::Config => commands::config::run(cli.config)?,
    }

    Ok(())
}

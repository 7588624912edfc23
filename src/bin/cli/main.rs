mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "recall-cli", about = "Spaced-repetition reviews for a note corpus", version)]
struct Cli {
    /// Context directory (default: current directory)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Context name (default: name of the corpus directory)
    #[arg(long, global = true)]
    context: Option<String>,

    /// Config file (default: <config dir>/recall/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
    /// One absolute note path per line
    Paths,
}

#[derive(Subcommand)]
enum Command {
    /// List notes due today, most overdue first (the default)
    Due {
        /// Maximum notes to show
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Record a review of a note
    Review {
        /// Note path, absolute or relative to --dir
        path: PathBuf,
        /// Recall quality: 0-2 failed, 3 hard, 4 good, 5 easy
        #[arg(value_parser = clap::value_parser!(u8).range(0..=5))]
        grade: u8,
    },

    /// Start tracking newly created notes
    Register {
        /// Note paths, absolute or relative to --dir
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Bring the schedule in line with the corpus
    Sync {
        /// Rescan even if nothing seems to have changed
        #[arg(long)]
        force: bool,
    },

    /// Show schedule statistics
    Stats,

    /// Show where the corpus and the schedule store live
    Where,

    /// Show the next interval for each grade
    Preview {
        /// Note path, absolute or relative to --dir
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();

    let mut app = app::App::new(
        cli.dir.as_deref(),
        cli.context.as_deref(),
        cli.config.as_deref(),
    )?;

    match cli.command.unwrap_or(Command::Due { limit: None }) {
        Command::Due { limit } => {
            commands::due::run(&mut app, limit, &cli.format, use_color)?;
        }
        Command::Review { path, grade } => {
            commands::review::run(&mut app, &path, grade, &cli.format, use_color)?;
        }
        Command::Register { paths } => {
            commands::register::run(&app, &paths, &cli.format, use_color)?;
        }
        Command::Sync { force } => {
            commands::sync::run(&mut app, force, &cli.format)?;
        }
        Command::Stats => {
            commands::stats::run(&mut app, &cli.format)?;
        }
        Command::Where => {
            commands::location::run(&app, &cli.format)?;
        }
        Command::Preview { path } => {
            commands::preview::run(&mut app, &path, &cli.format, use_color)?;
        }
    }

    Ok(())
}

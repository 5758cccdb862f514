//! StoryKit CLI: command-line interface for composing workout stories.
//!
//! Usage:
//!   storykit metrics <SESSION>        Show the statistics a story displays
//!   storykit layouts                  List the layout catalogue
//!   storykit layout <SESSION>         Print computed overlay boxes as JSON
//!   storykit render <SESSION>         Export a story image
//!   storykit export-video <SESSION>   Export a story video over a clip
//!   storykit check                    Check ffmpeg, encoders and fonts

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storykit_common::config::StoryConfig;
use storykit_render::ImageFormat;

mod commands;

#[derive(Parser)]
#[command(
    name = "storykit",
    about = "Compose shareable workout stories from a session record and a photo or video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the metrics extracted from a session record
    Metrics {
        /// Path to the session JSON
        session: PathBuf,
    },

    /// List the available layouts
    Layouts,

    /// Print the computed layout as JSON
    Layout {
        /// Path to the session JSON
        session: PathBuf,

        /// Layout id (bottom-row, right-stack, left-stack, top-row, live)
        #[arg(short, long, default_value = "bottom-row")]
        layout: String,

        /// JSON file with live positions
        #[arg(long)]
        positions: Option<PathBuf>,
    },

    /// Render the story to an image
    Render {
        /// Path to the session JSON
        session: PathBuf,

        /// Background photo
        #[arg(short, long)]
        media: Option<PathBuf>,

        /// Layout id
        #[arg(short, long, default_value = "bottom-row")]
        layout: String,

        /// JSON file with live positions
        #[arg(long)]
        positions: Option<PathBuf>,

        /// Output format: jpeg|png
        #[arg(short, long, default_value = "jpeg")]
        format: ImageFormat,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Re-encode a video clip with the story overlay
    ExportVideo {
        /// Path to the session JSON
        session: PathBuf,

        /// Background video
        #[arg(short, long)]
        media: PathBuf,

        /// Trim start (seconds)
        #[arg(long)]
        start: Option<f64>,

        /// Trim end (seconds)
        #[arg(long)]
        end: Option<f64>,

        /// Layout id
        #[arg(short, long, default_value = "bottom-row")]
        layout: String,

        /// JSON file with live positions
        #[arg(long)]
        positions: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = StoryConfig::load();
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    storykit_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Metrics { session } => commands::metrics::run(session),
        Commands::Layouts => commands::layouts::run(),
        Commands::Layout {
            session,
            layout,
            positions,
        } => commands::layout::run(config, session, layout, positions),
        Commands::Render {
            session,
            media,
            layout,
            positions,
            format,
            output,
        } => commands::render::run(config, session, media, layout, positions, format, output).await,
        Commands::ExportVideo {
            session,
            media,
            start,
            end,
            layout,
            positions,
            output,
        } => {
            commands::export_video::run(config, session, media, start, end, layout, positions, output)
                .await
        }
        Commands::Check => commands::check::run(&config),
    }
}

//! Ethogram CLI: command-line interface for behavior annotation catalogs.
//!
//! Usage:
//!   ethogram check               Check that ffmpeg and ffprobe are usable
//!   ethogram info <DIR>          Show a saved catalog
//!   ethogram validate <DIR>      Check a catalog's source videos
//!   ethogram header <DIR> <FILE> Write a catalog's header file
//!   ethogram replay <SCRIPT>     Run a scripted annotation pass
//!   ethogram extract <DIR>       Extract clips and stills for every mark

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ethogram_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "ethogram",
    about = "Keyboard-driven behavior annotation for synchronized videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check system capabilities
    Check,

    /// Show a saved behavior catalog
    Info {
        /// Catalog directory
        path: PathBuf,
    },

    /// Check that a catalog's source videos exist
    Validate {
        /// Catalog directory
        path: PathBuf,

        /// Resolve relative video paths against this directory
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Write the header (definitions without marks) of a catalog
    Header {
        /// Catalog directory
        path: PathBuf,

        /// Header file to write
        output: PathBuf,
    },

    /// Replay a JSONL input script into a new catalog
    Replay {
        /// Input script
        script: PathBuf,

        /// Source video (repeat for synchronized cameras)
        #[arg(long = "video", required = true)]
        videos: Vec<PathBuf>,

        /// Header file providing the behavior definitions
        #[arg(long)]
        header: Option<PathBuf>,

        /// Behavior definition as name:kind[:color] (repeatable)
        #[arg(long = "behavior")]
        behaviors: Vec<String>,

        /// Recording length; probed from the videos when omitted
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Directory to save the catalog into (must be empty)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Extract clips and stills for every mark of a catalog
    Extract {
        /// Catalog directory
        path: PathBuf,

        /// Directory to write epochs into
        #[arg(short, long)]
        output: PathBuf,

        /// Write the extraction report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    ethogram_common::logging::init_logging(&config.logging);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    match cli.command {
        Commands::Check => commands::check::run(&config),
        Commands::Info { path } => commands::info::run(path, &config),
        Commands::Validate { path, root } => commands::validate::run(path, root),
        Commands::Header { path, output } => commands::header::run(path, output),
        Commands::Replay {
            script,
            videos,
            header,
            behaviors,
            duration_ms,
            output,
        } => commands::replay::run(
            commands::replay::ReplayArgs {
                script,
                videos,
                header,
                behaviors,
                duration_ms,
                output,
            },
            &config,
        ),
        Commands::Extract {
            path,
            output,
            report,
        } => commands::extract::run(path, output, report, &config).await,
    }
}

use anyhow::Result;
use ayah_shorts::backgrounds::run_download;
use ayah_shorts::config::Config;
use ayah_shorts::init;
use ayah_shorts::logging::init_logging;
use ayah_shorts::pipeline::run_production;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ayah-shorts", version, about = "Vertical recitation shorts from validated verse plans")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate, validate and render a batch of videos (default)
    Produce,
    /// Download new portrait background footage from Pexels
    Backgrounds,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load_or_default(&cli.config).await?;
    init_logging(&cfg.logging);

    init::ensure_directories(&cfg.paths).await?;

    match cli.command.unwrap_or(Commands::Produce) {
        Commands::Produce => {
            if !init::check_ffmpeg().await {
                tracing::warn!("FFmpeg/ffprobe not found in PATH. Please install FFmpeg.");
            }
            run_production(&cfg).await?;
        }
        Commands::Backgrounds => {
            let client = reqwest::Client::builder().build()?;
            run_download(&cfg, client).await?;
        }
    }
    Ok(())
}

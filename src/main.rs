// Entrypoint for the CLI application.
// - Keeps `main` small: load configuration, build the pipeline, run it once.
// - Returns `anyhow::Result` so any failure exits non-zero with its message.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use xkcd_vk_poster::config::{
    ApiConfig, ComicSelection, FeedConfig, DEFAULT_API_URL, DEFAULT_API_VERSION,
    DEFAULT_FEED_URL, DEFAULT_STORAGE_DIR,
};
use xkcd_vk_poster::ui::{print_report, SpinnerObserver};
use xkcd_vk_poster::Pipeline;

/// Publish an xkcd comic on a VK community wall.
///
/// Credentials are read from VK_ACCESS_TOKEN and VK_GROUP_ID, optionally via
/// a `.env` file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Directory holding the downloaded image while it is uploaded
    #[arg(long, env = "POSTER_STORAGE_DIR", default_value = DEFAULT_STORAGE_DIR)]
    storage_dir: PathBuf,

    /// Base URL of the comic feed
    #[arg(long, env = "POSTER_FEED_URL", default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    /// Base URL of the VK API methods
    #[arg(long, env = "VK_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// VK API version
    #[arg(long, env = "VK_API_VERSION", default_value = DEFAULT_API_VERSION)]
    api_version: String,

    /// Publish a random comic instead of the latest one
    #[arg(long)]
    random: bool,

    /// Do not draw the progress spinner
    #[arg(short, long)]
    quiet: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    // first, so `.env` values feed both the flag fallbacks and RUST_LOG
    load_dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    // Missing credentials stop the run before any request is made.
    let pipeline = Pipeline::from_lookup(
        |key| std::env::var(key).ok(),
        ApiConfig {
            base_url: cli.api_url,
            version: cli.api_version,
        },
        FeedConfig {
            base_url: cli.feed_url,
            selection: if cli.random {
                ComicSelection::Random
            } else {
                ComicSelection::Latest
            },
        },
        cli.storage_dir,
    )?;
    let mut observer = if cli.quiet {
        SpinnerObserver::hidden()
    } else {
        SpinnerObserver::new()
    };
    let report = pipeline
        .run(&mut observer)
        .context("publishing the comic failed")?;

    print_report(&report);
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `.env` in the working directory first, then the per-user config file.
/// Variables already set in the environment always win.
fn load_dotenv() {
    dotenvy::dotenv().ok();
    if let Some(dir) = dirs::config_dir() {
        dotenvy::from_path(dir.join(env!("CARGO_PKG_NAME")).join(".env")).ok();
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use humansize::{format_size, DECIMAL};
use log::{info, LevelFilter};
use shorts::{
    config::ShortsConfig,
    http::{self, AppState},
    janitor,
    pipeline::Pipeline,
};

/// Vertical short generator: download, trim, crop, serve
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the web UI and API (default)
    Serve {
        /// Listen address, overrides the config file
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
    /// Render one short locally and print where it landed
    Render {
        /// Source video URL
        url: String,
    },
    /// Delete expired files from the working directories once
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let mut logger = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    );
    if args.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.format_timestamp_secs().init();

    let mut cfg = ShortsConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    cfg.ensure_dirs()
        .context("Failed to prepare working directories")?;

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(addr) = bind {
                cfg.bind_addr = addr;
            }
            info!("Shorts server starting");
            info!("  Staging dir: {}", cfg.staging_dir.display());
            info!("  Output dir: {} (served at {})", cfg.output_dir.display(), cfg.public_prefix);
            info!("  Landing page: {}", cfg.index_page.display());

            let pipeline = Pipeline::new(&cfg);
            pipeline.ffmpeg().verify().await
                .context("FFmpeg is not usable")?;
            pipeline.fetcher().verify().await
                .context("yt-dlp is not usable")?;

            http::serve(AppState::new(pipeline), cfg.bind_addr).await
        }
        Command::Render { url } => {
            let pipeline = Pipeline::new(&cfg);
            let short = pipeline.generate(Some(url.as_str())).await?;
            info!("Rendered {} ({:.1}s)", short.stem, short.plan.duration_secs);
            println!("{}", short.output_path.display());
            Ok(())
        }
        Command::Sweep => {
            let report = janitor::sweep_now(&cfg);
            println!(
                "scanned {} file(s), removed {}, reclaimed {}, failed {}",
                report.scanned,
                report.removed,
                format_size(report.bytes_reclaimed, DECIMAL),
                report.failed
            );
            Ok(())
        }
    }
}

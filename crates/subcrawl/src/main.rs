//! subcrawl - submission crawler

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use subcrawl::resume::batch_resume_point;
use subcrawl::{
    choose_start, CrawlConfig, CrawlContext, LegacyArchive, Orchestrator, SnapshotCapture,
};
use subcrawl_common::logging::{init_logging, LogConfig, LogLevel};
use subcrawl_common::SubmissionId;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "subcrawl")]
#[command(author, version, about = "Crawl submissions into resumable batch files")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file
    #[arg(
        short,
        long,
        env = "SUBCRAWL_CONFIG",
        default_value = "config.json",
        global = true
    )]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve submissions and write batch files
    Crawl {
        /// First id (overrides the resume point and START)
        #[arg(long)]
        start: Option<SubmissionId>,

        /// Exclusive end id (overrides END)
        #[arg(long)]
        end: Option<SubmissionId>,

        /// Batch tree root (overrides DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Legacy archive directory (overrides LEGACY_DIR)
        #[arg(long)]
        legacy_dir: Option<PathBuf>,
    },

    /// Store raw live pages in the snapshot tree
    Capture {
        #[arg(long)]
        start: Option<SubmissionId>,

        #[arg(long)]
        end: Option<SubmissionId>,

        /// Snapshot tree root (overrides SNAPSHOT_DIR)
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },

    /// Print the id the next run would start from
    Resume {
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Report the capture resume point instead of the crawl one
        #[arg(long)]
        snapshots: bool,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("subcrawl")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Warning: ignoring logging environment: {e:#}");
            log_config
        },
    };

    let guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {e:#}");
            None
        },
    };

    let code = match execute(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e:#}");
            1
        },
    };

    drop(guard);
    process::exit(code);
}

async fn execute(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli.config)?;

    match cli.command {
        Command::Crawl {
            start,
            end,
            data_dir,
            legacy_dir,
        } => {
            if let Some(dir) = data_dir {
                config = config.with_data_dir(dir);
            }
            if let Some(dir) = legacy_dir {
                config = config.with_legacy_dir(dir);
            }
            crawl(with_end(config, end), start).await
        },
        Command::Capture {
            start,
            end,
            snapshot_dir,
        } => {
            if let Some(dir) = snapshot_dir {
                config = config.with_snapshot_dir(dir);
            }
            capture(with_end(config, end), start).await
        },
        Command::Resume {
            data_dir,
            snapshots,
        } => {
            let point = if snapshots {
                subcrawl::resume::snapshot_resume_point(&config.capture_dir())?
            } else {
                batch_resume_point(&data_dir.unwrap_or(config.data_dir))?
            };
            match point {
                Some(id) => println!("{id}"),
                None => println!("none"),
            }
            Ok(())
        },
    }
}

/// `--end` replaces END; START stays as configured
fn with_end(config: CrawlConfig, end: Option<SubmissionId>) -> CrawlConfig {
    let start = config.start;
    let end = end.or(config.end);
    config.with_bounds(start, end)
}

fn load_config(path: &Path) -> Result<CrawlConfig> {
    if !path.exists() {
        info!(path = %path.display(), "No configuration file, using defaults");
        return Ok(CrawlConfig::default());
    }
    let config = CrawlConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

async fn crawl(config: CrawlConfig, start: Option<SubmissionId>) -> Result<()> {
    let ctx = CrawlContext::new(config).context("Invalid configuration")?;

    let legacy = match &ctx.config.legacy_dir {
        Some(dir) => LegacyArchive::discover(dir).context("Failed to read legacy archives")?,
        None => LegacyArchive::empty(),
    };

    let orchestrator = Orchestrator::from_context(&ctx, Arc::new(legacy));
    let resumed = orchestrator.resume_point()?;
    let start = choose_start(start, resumed, ctx.config.start);
    info!(start, resumed = ?resumed, "Chose start id");

    let summary = orchestrator.run(start, ctx.config.end).await?;
    info!(
        written = summary.batches_written,
        skipped = summary.batches_skipped,
        "Crawl complete"
    );
    Ok(())
}

async fn capture(config: CrawlConfig, start: Option<SubmissionId>) -> Result<()> {
    let ctx = CrawlContext::new(config).context("Invalid configuration")?;
    let capture = SnapshotCapture::from_context(&ctx, ctx.config.capture_dir());

    let resumed = capture.resume_point()?;
    let start = choose_start(start, resumed, ctx.config.start);
    info!(start, resumed = ?resumed, root = %capture.root().display(), "Chose start id");

    let summary = capture.run(start, ctx.config.end).await?;
    info!(pages = summary.pages, empty = summary.empty, "Capture complete");
    Ok(())
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use filemaster::types::{DEFAULT_API_VERSION, DEFAULT_PAGE_SIZE};
use filemaster::{
    export_shop, plan_export, AdminClient, BuildStatus, ExportConfig, FailurePolicy, Uploader,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "filemaster")]
#[command(about = "Export a Shopify store's media files into a zip archive", long_about = None)]
#[command(version)]
struct Args {
    /// Shop domain (e.g. my-shop.myshopify.com) or Admin API base URL
    #[arg(short, long, env = "SHOPIFY_SHOP")]
    shop: String,

    /// Admin API access token
    #[arg(long, env = "SHOPIFY_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Admin API version
    #[arg(long, default_value = DEFAULT_API_VERSION)]
    api_version: String,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every catalog file into <shop>-media.zip
    Export {
        /// Directory the archive is written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Catalog entries requested per page (1-250)
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,

        /// Maximum number of concurrent downloads (default: unlimited)
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Suffix of the archive's root folder
        #[arg(long, default_value = "_File-Master")]
        root_suffix: String,

        /// Stop at the first failed download instead of archiving the rest
        #[arg(long)]
        abort_on_error: bool,

        /// Only list what would be downloaded
        #[arg(long)]
        dry_run: bool,
    },

    /// Upload local files into the store's file catalog
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// MIME type for every file (default: guessed from the extension)
        #[arg(long)]
        mime_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("filemaster={}", log_level))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 FileMaster - Shopify Files Exporter");
    info!("Shop: {}", args.shop);

    let mut config = ExportConfig {
        shop: args.shop,
        access_token: args.access_token,
        api_version: args.api_version,
        ..ExportConfig::default()
    };

    match args.command {
        Command::Export {
            output,
            page_size,
            max_concurrent,
            root_suffix,
            abort_on_error,
            dry_run,
        } => {
            config.page_size = page_size;
            config.max_concurrent_downloads = max_concurrent;
            config.root_folder_suffix = root_suffix;
            if abort_on_error {
                config.failure_policy = FailurePolicy::Abort;
            }

            if dry_run {
                run_dry_run(&config).await
            } else {
                run_export(&config, output).await
            }
        }
        Command::Upload { files, mime_type } => run_upload(&config, files, mime_type).await,
    }
}

async fn run_dry_run(config: &ExportConfig) -> anyhow::Result<()> {
    let plan = plan_export(config).await.context("failed to plan export")?;

    for task in &plan.tasks {
        println!("{:<7} {}  <- {}", task.bucket, task.file_name, task.source_url);
    }
    for gap in &plan.gaps {
        println!(
            "skipped #{} {}: {}",
            gap.index,
            gap.id.as_deref().unwrap_or("-"),
            gap.reason
        );
    }
    info!(
        "{} would export {} file(s), {} skipped",
        plan.shop.name,
        plan.tasks.len(),
        plan.gaps.len()
    );
    Ok(())
}

async fn run_export(config: &ExportConfig, output: PathBuf) -> anyhow::Result<()> {
    let started = Instant::now();

    let pb = if atty::is(atty::Stream::Stderr) {
        indicatif::ProgressBar::new(100)
    } else {
        indicatif::ProgressBar::hidden()
    };
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template(
                "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}% {msg} | {elapsed_precise} elapsed",
            )?
            .progress_chars("█▓▒░ "),
    );
    pb.set_message("📦 Fetching catalog");

    let result = export_shop(config, |state| {
        pb.set_position(state.percent() as u64);
        pb.set_message(format!("| ⬇️  {}/{} files", state.settled(), state.total));
        if state.status == BuildStatus::Failed {
            pb.abandon_with_message("❌ Download failed!");
        }
    })
    .await;

    let (shop, report) = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            pb.abandon();
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    let path = report
        .archive
        .save(&output)
        .await
        .with_context(|| format!("failed to write archive to {}", output.display()))?;

    let elapsed = Duration::from_secs(started.elapsed().as_secs());
    if report.is_complete() {
        pb.finish_with_message("✅ Files downloaded successfully!");
        info!(
            "✅ Exported {} file(s) for {} to {} in {}",
            report.state.completed,
            shop.name,
            path.display(),
            humantime::format_duration(elapsed)
        );
        return Ok(());
    }

    pb.abandon_with_message("⚠️  Some files could not be downloaded");
    for failure in &report.failures {
        warn!(
            "Missing {}/{}: {}",
            failure.task.bucket, failure.task.file_name, failure.reason
        );
    }
    eprintln!(
        "❌ {} of {} file(s) failed; partial archive written to {}",
        report.failures.len(),
        report.state.total,
        path.display()
    );
    std::process::exit(2);
}

async fn run_upload(
    config: &ExportConfig,
    files: Vec<PathBuf>,
    mime_type: Option<String>,
) -> anyhow::Result<()> {
    config.validate()?;

    let mut uploader = Uploader::new(AdminClient::new(config)?);
    if let Some(mime_type) = mime_type {
        uploader = uploader.with_mime_type(mime_type);
    }

    let report = uploader.upload_all(&files).await;
    for uploaded in &report.uploaded {
        println!("{}\t{}", uploaded.file_id, uploaded.path.display());
    }

    if !report.failed.is_empty() {
        for e in &report.failed {
            eprintln!("❌ Error: {}", e);
        }
        std::process::exit(1);
    }

    info!("✅ Uploaded {} file(s)", report.uploaded.len());
    Ok(())
}

//! drive_mirror CLI - Mirror Google Drive folders to a local directory.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use drive_mirror::config::{DEFAULT_LINKS_FILE, DEFAULT_MAX_DEPTH, DEFAULT_OUTPUT_DIR};
use drive_mirror::logging::{init_logging, LogOptions};
use drive_mirror::models::format_size;
use drive_mirror::{bulk_download, extract_id, Authenticator, DriveClient, MirrorConfig, RunSummary};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Bulk-download Google Drive folders, mirroring their structure locally.
#[derive(Parser)]
#[command(name = "drive_mirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File with one Google Drive folder link per line.
    #[arg(long, env = "DRIVE_MIRROR_LINKS", default_value = DEFAULT_LINKS_FILE)]
    links_file: PathBuf,

    /// Directory the folders are mirrored into.
    #[arg(long, short = 'o', env = "DRIVE_MIRROR_OUTPUT", default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// OAuth client secrets downloaded from the Google Cloud console.
    #[arg(long, env = "DRIVE_MIRROR_CLIENT_SECRETS", default_value = "client_secrets.json")]
    client_secrets: PathBuf,

    /// Where OAuth credentials are cached between runs.
    #[arg(long, env = "DRIVE_MIRROR_CREDENTIALS", default_value = "credentials.json")]
    credentials_cache: PathBuf,

    /// Authenticate with a service account JSON key instead of OAuth.
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    service_account: Option<PathBuf>,

    /// Directory for the per-run log file.
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,

    /// Deepest folder level descended into below each root.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Do not draw a progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Log at DEBUG level.
    #[arg(long)]
    debug: bool,

    /// Extra folder URLs or IDs, mirrored after those in the links file.
    folders: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_guard = match init_logging(&LogOptions {
        log_dir: cli.log_dir.clone(),
        debug: cli.debug,
        use_color: true,
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Fatal errors are reported once, through the log.
    let code = match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    };
    info!("Logs saved to: {}", log_guard.path().display());
    code
}

async fn run(cli: Cli) -> Result<()> {
    let auth = match &cli.service_account {
        Some(path) => Authenticator::from_service_account_file(path).with_context(|| {
            format!("Failed to load service account credentials from {:?}", path)
        })?,
        None => Authenticator::installed_app(&cli.client_secrets, &cli.credentials_cache),
    };
    auth.authenticate().await.context("Authentication failed")?;

    let mut extra_folder_ids = Vec::new();
    for folder in &cli.folders {
        let id = extract_id(folder)
            .with_context(|| format!("Invalid folder URL or ID: {}", folder))?;
        extra_folder_ids.push(id);
    }

    let config = MirrorConfig::new()
        .with_links_file(cli.links_file)
        .with_output_dir(cli.output)
        .with_extra_folder_ids(extra_folder_ids)
        .with_max_depth(cli.max_depth)
        .with_progress(!cli.no_progress);

    let client = DriveClient::new(auth);
    let summary = bulk_download(&client, &config).await?;
    print_summary(&summary);

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let report = &summary.report;

    println!("\n{SEPARATOR}");
    println!("Mirror Summary");
    println!("{SEPARATOR}");
    println!("  Root folders:      {}", summary.roots.len());
    println!(
        "  Files processed:   {}/{}",
        summary.processed, summary.total_files
    );
    println!("  Downloaded:        {}", report.downloaded());
    println!("  Exported as PDF:   {}", report.exported());
    println!("  Already present:   {}", report.skipped_existing());
    if report.unavailable() > 0 {
        println!("  Not downloadable:  {}", report.unavailable());
    }
    if report.failed() > 0 {
        println!("  Failed:            {}", report.failed());
    }
    if !report.folder_failures.is_empty() {
        println!("  Folders abandoned: {}", report.folder_failures.len());
    }
    println!("  Total written:     {}", format_size(report.bytes_written()));
    println!("{SEPARATOR}");
}

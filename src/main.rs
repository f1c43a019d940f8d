use anyhow::Context;
use clap::Parser;
use pagegrab::{grab_document, GrabConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pagegrab")]
#[command(about = "Download page images from a document viewer and merge them into a PDF", long_about = None)]
#[command(version)]
struct Args {
    /// Document identifier on the viewer service
    #[arg(short, long)]
    doc: String,

    /// Subfolder identifier on the viewer service
    #[arg(short, long)]
    subfolder: String,

    /// Number of pages to fetch (pages 1..=N)
    #[arg(short, long)]
    pages: u32,

    /// Session cookie passed through unmodified
    #[arg(long, env = "PAGEGRAB_COOKIE", hide_env_values = true, default_value = "")]
    cookie: String,

    /// Output PDF path
    #[arg(short, long, default_value = "output.pdf")]
    output: PathBuf,

    /// Staging directory for downloaded page images
    #[arg(long, default_value = "downloaded_pages")]
    staging_dir: PathBuf,

    /// Page image endpoint
    #[arg(long, default_value = "https://ir.vnulib.edu.vn/flowpaper/services/view.php")]
    base_url: String,

    /// Viewer page sent as the Referer
    #[arg(long, default_value = "https://ir.vnulib.edu.vn/flowpaper/simple_document.php")]
    viewer_url: String,

    /// Image format requested from the service
    #[arg(long, default_value = "png")]
    format: String,

    /// Maximum attempts per page
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: u32,

    /// Per-request timeout (e.g. "20s", "1m")
    #[arg(long, default_value = "20s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Backoff unit; attempt k+1 waits 2^k units
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    backoff_unit: Duration,

    /// Maximum pages downloading at once (0 = no limit)
    #[arg(long, default_value_t = 8)]
    max_concurrent: usize,

    /// Keep the staging directory after merging
    #[arg(long)]
    keep_staging: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("pagegrab={}", log_level))
        .with_writer(std::io::stderr)
        .init();

    info!("🚀 PageGrab - Document Page Downloader");
    info!("Document: {} (subfolder {})", args.doc, args.subfolder);
    info!("Pages: {}", args.pages);
    info!("Output: {:?}", args.output);

    let config = GrabConfig {
        base_url: args.base_url,
        viewer_url: args.viewer_url,
        document_id: args.doc,
        subfolder: args.subfolder,
        max_page: args.pages,
        session_cookie: args.cookie,
        image_format: args.format,
        staging_dir: args.staging_dir,
        output_path: args.output,
        max_retries: args.max_retries,
        request_timeout: args.timeout,
        backoff_unit: args.backoff_unit,
        max_concurrent_downloads: (args.max_concurrent > 0).then_some(args.max_concurrent),
        keep_staging: args.keep_staging,
        show_progress: progress_enabled(args.json, args.verbose),
    };

    let report = grab_document(&config)
        .await
        .context("Failed to grab document")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !report.dropped.is_empty() {
        info!("Dropped pages: {:?}", report.dropped);
    }

    match &report.output {
        Some(path) => info!(
            "✅ Saved {}/{} pages to {}",
            report.recovered.len(),
            report.requested,
            path.display()
        ),
        None => info!("❌ No pages were recovered; nothing was written"),
    }

    Ok(())
}

/// The progress bar shares stderr with the log output, so it is only drawn
/// when neither JSON output nor debug logging is requested.
fn progress_enabled(json: bool, verbose: bool) -> bool {
    !json && !verbose
}

//! Command-line interface for market-brief
//!
//! Runs one report end to end and exits non-zero if the run aborts.

use anyhow::Context;
use brief_stock::{BriefConfig, Pipeline, ReportKind, RunContext};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "market-brief")]
#[command(about = "Build and e-mail the daily stock brief or news digest", long_about = None)]
struct Args {
    /// Report to build: `stock` or `news` (defaults to BRIEF_REPORT)
    #[arg(short, long)]
    report: Option<ReportKind>,

    /// Print the report instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Print the effective configuration (secrets omitted) and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG may come from .env
    brief_utils::load_dotenv();
    brief_utils::init_tracing();

    let args = Args::parse();
    if args.print_config {
        let config = BriefConfig::load_env_with(args.report, args.dry_run)
            .context("failed to load configuration")?;
        println!("{}", serde_json::to_string_pretty(&config)?);
        if let Err(e) = config.validate() {
            eprintln!("{e}");
        }
        return Ok(());
    }

    let config = BriefConfig::from_env_with(args.report, args.dry_run)
        .context("failed to load configuration")?;

    info!("Starting market-brief ({:?})", config.report);

    let pipeline = Pipeline::from_config(&config).context("failed to set up pipeline")?;
    let mut ctx = RunContext::from_config(&config);
    let summary = pipeline.run(&mut ctx).await.context("report run aborted")?;

    info!(
        subject = %summary.subject,
        sections = summary.sections,
        skipped = ?summary.skipped,
        degraded = summary.degraded,
        "Run finished"
    );
    Ok(())
}

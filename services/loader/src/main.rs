//! Loader CLI - Dispatches the normalization pipelines
//!
//! Usage:
//!   # Latest expenditure report, upserted:
//!   cargo run --bin loader -- --target egresos_single
//!
//!   # Every income period, table replaced:
//!   cargo run --bin loader -- --family ingresos --bulk
//!
//!   # One period, no database, records written to CSV:
//!   cargo run --bin loader -- --family balance --year 2024 --quarter 2 --dry-run --export out.csv

use anyhow::{Context, Result};
use clap::Parser;
use collector::{parse_quarter, Collector, PeriodKey, SourceConfig};
use loader::export::export_csv;
use loader::{
    run_journaled, Config, LoadMethod, PgJournal, PgSink, Pipeline, RunLog, RunMode, RunOutput, Target,
};
use normalizer::{IdentityStrategy, ReportFamily};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "loader", about = "Normalizes quarterly financial reports and loads them")]
struct Args {
    /// Pipeline target, e.g. egresos_bulk or balance_single (defaults to PIPELINE_TARGET)
    #[arg(long)]
    target: Option<String>,

    /// Report family (balance, egresos, ingresos); overrides --target
    #[arg(long)]
    family: Option<ReportFamily>,

    /// Process every discovered period (with --family)
    #[arg(long, default_value = "false")]
    bulk: bool,

    /// Period year for a single run
    #[arg(long)]
    year: Option<i32>,

    /// Period quarter for a single run (1-4, Q1, 1T)
    #[arg(long)]
    quarter: Option<String>,

    /// Load method: insert, upsert or overwrite (defaults to LOAD_METHOD, then per mode)
    #[arg(long)]
    load_method: Option<LoadMethod>,

    /// Identity strategy: deterministic or random (defaults to IDENTITY_MODE)
    #[arg(long)]
    identity: Option<IdentityStrategy>,

    /// Source override: local or remote (defaults to SOURCE)
    #[arg(long)]
    source: Option<String>,

    /// Dry run - normalize only, no database writes and no journal
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Write the normalized records to this CSV file
    #[arg(long)]
    export: Option<PathBuf>,
}

fn resolve_target(args: &Args, config: &Config) -> Result<Target> {
    if let Some(family) = args.family {
        return Ok(Target { family, bulk: args.bulk });
    }
    let name = args
        .target
        .as_deref()
        .or(config.pipeline_target.as_deref())
        .context("Must specify --family <family> [--bulk] or --target <pipeline> (or set PIPELINE_TARGET)")?;
    Ok(name.parse::<Target>()?)
}

fn resolve_mode(args: &Args, target: Target) -> Result<RunMode> {
    let period = match (args.year, args.quarter.as_deref()) {
        (None, None) => None,
        (Some(year), Some(q)) => {
            let quarter = parse_quarter(q).with_context(|| format!("Invalid quarter '{}'", q))?;
            PeriodKey::new(year, quarter)
        }
        _ => anyhow::bail!("--year and --quarter must be given together"),
    };

    if target.bulk {
        if period.is_some() {
            anyhow::bail!("--year/--quarter cannot be combined with a bulk run");
        }
        Ok(RunMode::Bulk)
    } else {
        Ok(RunMode::Single(period))
    }
}

async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("Failed to connect to database")
}

fn print_summary(output: &RunOutput) {
    let report = &output.report;
    println!("\n=== Run Complete: {} ===", report.pipeline);
    match report.load_method {
        Some(method) => println!("Load method: {}", method),
        None => println!("Dry run - no rows written"),
    }
    let loaded: Vec<String> = report.loaded.iter().map(|p| p.to_string()).collect();
    println!("Periods loaded: {}", loaded.join(", "));
    for failure in &report.failed {
        println!("  ✗ {}: {}", failure.period, failure.reason);
    }
    println!("Rows: {}", report.rows);

    for (i, r) in output.records.iter().take(3).enumerate() {
        println!(
            "  [{}] {} | {} | {} | {} | {:?}",
            i + 1,
            r.year_quarter,
            r.code.as_deref().or(r.secondary_code.as_deref()).unwrap_or("-"),
            r.label,
            r.metric,
            r.amount
        );
    }
    if output.records.len() > 3 {
        println!("  ... and {} more", output.records.len() - 3);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Config::from_env()?;

    let run_log = RunLog::new().with_dir(config.log_dir.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loader=info,collector=info,normalizer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(run_log.clone())
                .with_ansi(false),
        )
        .init();

    let target = resolve_target(&args, &config)?;
    let mode = resolve_mode(&args, target)?;
    let identity = args.identity.unwrap_or(config.identity);
    let load_method = args.load_method.or(config.load_method);

    let source_config = SourceConfig::from_env_with(args.source.as_deref())?;
    let collector = Collector::from_config(&source_config)?;

    println!("=== Financial Report Loader ===");
    println!("Pipeline: {}", loader::pipeline_name(target.family, mode));
    println!("Source: {}", source_config.describe());
    println!("Identity: {}", identity);
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    let pipeline = Pipeline::new(&collector)
        .with_identity(identity)
        .with_load_method(load_method);

    let output = if args.dry_run {
        pipeline.run(target.family, mode).await?
    } else {
        let pool = connect(config.db_url()?, config.max_connections).await?;
        let journal_pool = match config.log_db_url.as_deref() {
            Some(url) if Some(url) != config.db_url.as_deref() => connect(url, 2).await?,
            _ => pool.clone(),
        };
        let sink = PgSink::new(pool);
        let journal = PgJournal::new(journal_pool);
        let pipeline = pipeline.with_sink(&sink);
        run_journaled(&journal, &pipeline, target.family, mode, &run_log).await?
    };

    print_summary(&output);

    if let Some(path) = &args.export {
        export_csv(path, &output.records)?;
        println!("Exported {} records to {}", output.records.len(), path.display());
    }

    Ok(())
}

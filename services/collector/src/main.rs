//! Collector CLI - Lists published report periods and mirrors the workbooks
//!
//! Usage:
//!   # List periods for every family:
//!   cargo run --bin collector
//!
//!   # List one family from the remote bucket:
//!   SOURCE=remote cargo run --bin collector -- --family egresos
//!
//!   # Copy the files into a local tree usable with SOURCE=local:
//!   cargo run --bin collector -- --mirror ./data

use anyhow::{Context, Result};
use clap::Parser;
use collector::{content_hash, Collector, PeriodKey, ReportSource, SourceConfig};
use normalizer::ReportFamily;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Lists and mirrors quarterly financial report files")]
struct Args {
    /// Report family (balance, egresos, ingresos); all families when omitted
    #[arg(long)]
    family: Option<ReportFamily>,

    /// Source override: local or remote (defaults to SOURCE env var)
    #[arg(long)]
    source: Option<String>,

    /// Download every discovered file into this directory
    #[arg(long)]
    mirror: Option<PathBuf>,

    /// Re-download even when the mirrored copy has the same hash
    #[arg(long, default_value = "false")]
    force: bool,
}

#[derive(Debug, PartialEq)]
enum MirrorOutcome {
    Written,
    Unchanged,
}

/// Write `bytes` to `path` unless a file with the same content hash is
/// already there.
async fn mirror_file(path: &Path, bytes: &[u8], force: bool) -> Result<MirrorOutcome> {
    if !force {
        if let Ok(existing) = fs::read(path).await {
            if content_hash(&existing) == content_hash(bytes) {
                return Ok(MirrorOutcome::Unchanged);
            }
        }
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(MirrorOutcome::Written)
}

async fn mirror_period(
    collector: &Collector,
    dir: &Path,
    family: ReportFamily,
    period: PeriodKey,
    force: bool,
) -> Result<MirrorOutcome> {
    let bytes = collector.download(family, period).await?;
    let path = dir
        .join(family.storage_prefix())
        .join(collector::naming::file_name(family, period));
    let outcome = mirror_file(&path, &bytes, force).await?;
    tracing::info!(path = %path.display(), ?outcome, hash = %content_hash(&bytes), "mirrored");
    Ok(outcome)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = SourceConfig::from_env_with(args.source.as_deref())?;
    let collector = Collector::from_config(&config)?;

    println!("=== Report Collector ===");
    println!("Source: {}", config.describe());

    let families: Vec<ReportFamily> = match args.family {
        Some(f) => vec![f],
        None => ReportFamily::ALL.to_vec(),
    };

    let mut written = 0;
    let mut unchanged = 0;
    let mut failed = 0;

    for family in families {
        let periods = collector.discover(family).await?;
        println!("\n[{}] {} period(s)", family, periods.len());
        for period in &periods {
            println!("  - {}  {}", period, collector.location(family, *period));
        }

        let Some(dir) = &args.mirror else { continue };
        for period in periods {
            match mirror_period(&collector, dir, family, period, args.force).await {
                Ok(MirrorOutcome::Written) => written += 1,
                Ok(MirrorOutcome::Unchanged) => unchanged += 1,
                Err(e) => {
                    tracing::error!(family = %family, %period, error = %e, "mirror failed");
                    failed += 1;
                }
            }
        }
    }

    if args.mirror.is_some() {
        println!("\n=== Mirror Summary ===");
        println!("Written: {}", written);
        println!("Unchanged: {}", unchanged);
        println!("Failed: {}", failed);
        if failed > 0 {
            anyhow::bail!("{} file(s) could not be mirrored", failed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mirror_skips_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/F4.xlsx");

        assert_eq!(mirror_file(&path, b"one", false).await.unwrap(), MirrorOutcome::Written);
        assert_eq!(mirror_file(&path, b"one", false).await.unwrap(), MirrorOutcome::Unchanged);
        assert_eq!(mirror_file(&path, b"one", true).await.unwrap(), MirrorOutcome::Written);
        assert_eq!(mirror_file(&path, b"two", false).await.unwrap(), MirrorOutcome::Written);
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
    }
}

//! CSV export of normalized records.

use anyhow::{Context, Result};
use normalizer::NormalizedRecord;
use std::io::Write;
use std::path::Path;

pub fn write_records<W: Write>(writer: W, records: &[NormalizedRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record).context("failed to serialize record")?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_csv(path: &Path, records: &[NormalizedRecord]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_records(file, records)?;
    tracing::info!(path = %path.display(), records = records.len(), "exported records");
    Ok(())
}

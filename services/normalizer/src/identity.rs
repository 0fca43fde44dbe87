//! Row identities used as the load-time conflict key.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::family::ReportFamily;
use crate::reshape::LongRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityStrategy {
    /// SHA-256 of the row's natural key; reruns over the same file reproduce
    /// the same identities, so upserts merge instead of appending.
    #[default]
    Deterministic,
    /// A fresh random key per row; every run loads as a new batch.
    Random,
}

impl IdentityStrategy {
    pub fn identity(&self, row: &LongRow) -> String {
        match self {
            IdentityStrategy::Deterministic => content_key(&row.natural_key()),
            IdentityStrategy::Random => random_key(),
        }
    }
}

impl fmt::Display for IdentityStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityStrategy::Deterministic => f.write_str("deterministic"),
            IdentityStrategy::Random => f.write_str("random"),
        }
    }
}

impl FromStr for IdentityStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deterministic" | "hash" => Ok(IdentityStrategy::Deterministic),
            "random" => Ok(IdentityStrategy::Random),
            other => Err(format!(
                "invalid identity mode '{}': choose from [deterministic, random]",
                other
            )),
        }
    }
}

fn content_key(natural_key: &str) -> String {
    format!("{:x}", Sha256::digest(natural_key.as_bytes()))
}

/// Two v4 UUIDs concatenated, URL-safe base64 without padding.
fn random_key() -> String {
    let mut raw = Vec::with_capacity(32);
    raw.extend_from_slice(Uuid::new_v4().as_bytes());
    raw.extend_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(raw)
}

/// The final long-format record handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub identity: String,
    pub family: ReportFamily,
    pub code: Option<String>,
    pub secondary_code: Option<String>,
    pub label: String,
    pub metric: String,
    pub amount: Option<f64>,
    pub full_date: Option<String>,
    pub year_quarter: String,
    pub section: String,
    pub source_file: String,
    pub source_row: usize,
}

impl NormalizedRecord {
    fn keyed(identity: String, row: LongRow) -> Self {
        Self {
            identity,
            family: row.family,
            code: row.code,
            secondary_code: row.secondary_code,
            label: row.label,
            metric: row.metric,
            amount: row.amount,
            full_date: row.full_date,
            year_quarter: row.year_quarter,
            section: row.section,
            source_file: row.source_file,
            source_row: row.source_row,
        }
    }
}

pub fn assign_identities(rows: Vec<LongRow>, strategy: IdentityStrategy) -> Vec<NormalizedRecord> {
    rows.into_iter()
        .map(|row| {
            let identity = strategy.identity(&row);
            NormalizedRecord::keyed(identity, row)
        })
        .collect()
}

//! In-memory source, sink and journal used by the crate's tests.

use async_trait::async_trait;
use collector::{PeriodKey, ReportSource, SourceError, SourceFile};
use normalizer::{Cell, NormalizedRecord, RawSheet, ReportFamily};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::error::{JournalError, LoadError};
use crate::journal::{RunHandle, RunJournal, RunStatus};
use crate::load::{LoadMethod, RecordSink};

pub fn record(identity: &str, amount: f64) -> NormalizedRecord {
    NormalizedRecord {
        identity: identity.to_string(),
        family: ReportFamily::BudgetBalance,
        code: Some("A1".to_string()),
        secondary_code: None,
        label: "Ingresos de Libre Disposición".to_string(),
        metric: "devengado".to_string(),
        amount: Some(amount),
        full_date: Some("2023-03-31".to_string()),
        year_quarter: "2023_Q1".to_string(),
        section: "I".to_string(),
        source_file: "F4_Balance_Presupuestario_LDF_1T2023.xlsx".to_string(),
        source_row: 10,
    }
}

/// A budget-balance sheet with the period header in row 3 and one coded row
/// per entry, starting at row 6.
pub fn budget_sheet(header: &str, rows: &[(&str, f64)]) -> RawSheet {
    let mut grid: Vec<Vec<Cell>> = vec![Vec::new(); 3];
    grid.push(vec![Cell::Empty, Cell::from(header)]);
    grid.push(Vec::new());
    grid.push(vec![Cell::Empty, Cell::from("Concepto")]);
    for (concept, value) in rows {
        grid.push(vec![
            Cell::Empty,
            Cell::from(*concept),
            Cell::Number(*value),
            Cell::Number(*value),
            Cell::Number(*value),
        ]);
    }
    RawSheet::new(ReportFamily::BudgetBalance.sheet_name(), grid)
}

// =============================================================================
// Source
// =============================================================================

/// Periods mapped to a sheet, or to `None` for a listed but unreadable file.
#[derive(Default)]
pub struct MemorySource {
    files: BTreeMap<(ReportFamily, PeriodKey), Option<RawSheet>>,
}

impl MemorySource {
    pub fn with(mut self, family: ReportFamily, year: i32, quarter: u8, sheet: Option<RawSheet>) -> Self {
        let period = PeriodKey::new(year, quarter).expect("valid quarter");
        self.files.insert((family, period), sheet);
        self
    }
}

#[async_trait]
impl ReportSource for MemorySource {
    async fn discover(&self, family: ReportFamily) -> Result<Vec<PeriodKey>, SourceError> {
        Ok(self
            .files
            .keys()
            .filter(|(f, _)| *f == family)
            .map(|(_, p)| *p)
            .collect())
    }

    async fn fetch(&self, family: ReportFamily, period: PeriodKey) -> Option<SourceFile> {
        let sheet = self.files.get(&(family, period))?.clone()?;
        Some(SourceFile {
            family,
            period,
            file_name: collector::naming::file_name(family, period),
            location: format!("memory://{}", collector::naming::object_key(family, period)),
            content_hash: "sha256:test".to_string(),
            sheet,
        })
    }
}

// =============================================================================
// Sink
// =============================================================================

/// Tables keyed by identity, with the same transactional semantics as the
/// PostgreSQL sink: a failed write leaves the table untouched.
#[derive(Default)]
pub struct MemorySink {
    tables: Mutex<HashMap<ReportFamily, Vec<NormalizedRecord>>>,
    pub fail_writes: bool,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self { fail_writes: true, ..Self::default() }
    }

    pub fn row_count(&self, family: ReportFamily) -> usize {
        self.tables.lock().unwrap().get(&family).map(Vec::len).unwrap_or(0)
    }

    pub fn amount(&self, family: ReportFamily, identity: &str) -> Option<f64> {
        self.tables
            .lock()
            .unwrap()
            .get(&family)?
            .iter()
            .find(|r| r.identity == identity)?
            .amount
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn write(
        &self,
        family: ReportFamily,
        records: &[&NormalizedRecord],
        method: LoadMethod,
    ) -> Result<usize, LoadError> {
        if self.fail_writes {
            return Err(LoadError::Database(sqlx::Error::PoolClosed));
        }

        let mut tables = self.tables.lock().unwrap();
        let mut table = tables.get(&family).cloned().unwrap_or_default();

        if method == LoadMethod::Overwrite {
            table.clear();
        }
        for record in records {
            match table.iter_mut().find(|r| r.identity == record.identity) {
                Some(existing) if method == LoadMethod::Upsert => *existing = (*record).clone(),
                Some(_) => {
                    return Err(LoadError::IdentityCollision {
                        table: family.table_name().to_string(),
                        identity: record.identity.clone(),
                    })
                }
                None => table.push((*record).clone()),
            }
        }

        tables.insert(family, table);
        Ok(records.len())
    }
}

// =============================================================================
// Journal
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub pipeline_name: String,
    pub run_id: i32,
    pub status: RunStatus,
    pub logs: Option<String>,
}

#[derive(Default)]
pub struct MemoryJournal {
    pub entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryJournal {
    pub fn statuses(&self) -> Vec<RunStatus> {
        self.entries.lock().unwrap().iter().map(|e| e.status).collect()
    }
}

#[async_trait]
impl RunJournal for MemoryJournal {
    async fn begin(&self, pipeline: &str, _config: &serde_json::Value) -> Result<RunHandle, JournalError> {
        let mut entries = self.entries.lock().unwrap();
        let run_id = entries
            .iter()
            .filter(|e| e.pipeline_name == pipeline)
            .map(|e| e.run_id)
            .max()
            .unwrap_or(0)
            + 1;
        entries.push(JournalEntry {
            pipeline_name: pipeline.to_string(),
            run_id,
            status: RunStatus::Start,
            logs: None,
        });
        Ok(RunHandle { pipeline_name: pipeline.to_string(), run_id })
    }

    async fn complete(&self, handle: &RunHandle, status: RunStatus, detail: &str) -> Result<(), JournalError> {
        self.entries.lock().unwrap().push(JournalEntry {
            pipeline_name: handle.pipeline_name.clone(),
            run_id: handle.run_id,
            status,
            logs: Some(detail.to_string()),
        });
        Ok(())
    }
}

//! Pipeline runner: source → normalizer → load engine, per family.
//!
//! Single runs process one period (explicit or latest) and fail on any
//! error. Bulk runs walk every discovered period in order, skip the ones
//! that cannot be fetched or normalized, and load the combined batch once.

use collector::{PeriodKey, ReportSource};
use normalizer::{IdentityStrategy, NormalizedRecord, ReportFamily};
use serde::Serialize;
use std::str::FromStr;

use crate::error::PipelineError;
use crate::journal::{RunJournal, RunStatus};
use crate::load::{load_records, LoadMethod, RecordSink};
use crate::runlog::RunLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One period; the latest discovered one when `None`.
    Single(Option<PeriodKey>),
    Bulk,
}

impl RunMode {
    pub fn is_bulk(&self) -> bool {
        matches!(self, RunMode::Bulk)
    }

    pub fn default_method(&self) -> LoadMethod {
        if self.is_bulk() {
            LoadMethod::Overwrite
        } else {
            LoadMethod::Upsert
        }
    }
}

pub fn pipeline_name(family: ReportFamily, mode: RunMode) -> String {
    if mode.is_bulk() {
        format!("{}_bulk_pipeline", family.slug())
    } else {
        format!("{}_pipeline", family.slug())
    }
}

/// A dispatch target such as `egresos_bulk`, `balance_single` or a full
/// pipeline name like `ingresos_detallado_bulk_pipeline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub family: ReportFamily,
    pub bulk: bool,
}

impl FromStr for Target {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let name = name.strip_suffix("_pipeline").unwrap_or(&name);
        let (family, bulk) = if let Some(f) = name.strip_suffix("_bulk") {
            (f, true)
        } else if let Some(f) = name.strip_suffix("_single") {
            (f, false)
        } else {
            (name, false)
        };
        let family = family
            .parse::<ReportFamily>()
            .map_err(|_| PipelineError::Configuration(format!("unknown pipeline target '{}'", s.trim())))?;
        Ok(Target { family, bulk })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodFailure {
    pub period: PeriodKey,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub family: ReportFamily,
    /// `None` for dry runs.
    pub load_method: Option<LoadMethod>,
    pub loaded: Vec<PeriodKey>,
    pub failed: Vec<PeriodFailure>,
    pub rows: usize,
}

#[derive(Debug)]
pub struct RunOutput {
    pub report: RunReport,
    pub records: Vec<NormalizedRecord>,
}

pub struct Pipeline<'a> {
    source: &'a dyn ReportSource,
    sink: Option<&'a dyn RecordSink>,
    identity: IdentityStrategy,
    load_method: Option<LoadMethod>,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn ReportSource) -> Self {
        Self {
            source,
            sink: None,
            identity: IdentityStrategy::default(),
            load_method: None,
        }
    }

    /// Without a sink the run stops after normalization (dry run).
    pub fn with_sink(mut self, sink: &'a dyn RecordSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_identity(mut self, identity: IdentityStrategy) -> Self {
        self.identity = identity;
        self
    }

    /// Overrides the per-mode default load method.
    pub fn with_load_method(mut self, method: Option<LoadMethod>) -> Self {
        self.load_method = method;
        self
    }

    pub fn load_method_for(&self, mode: RunMode) -> LoadMethod {
        self.load_method.unwrap_or_else(|| mode.default_method())
    }

    /// The settings recorded in the journal's `start` row.
    pub fn describe(&self, family: ReportFamily, mode: RunMode) -> serde_json::Value {
        let period = match mode {
            RunMode::Single(Some(p)) => p.to_string(),
            RunMode::Single(None) => "latest".to_string(),
            RunMode::Bulk => "all".to_string(),
        };
        serde_json::json!({
            "family": family,
            "table": family.table_name(),
            "period": period,
            "identity": self.identity.to_string(),
            "load_method": self.load_method_for(mode),
            "dry_run": self.sink.is_none(),
        })
    }

    async fn normalize_period(
        &self,
        family: ReportFamily,
        period: PeriodKey,
    ) -> Result<Vec<NormalizedRecord>, PipelineError> {
        let file = self
            .source
            .fetch(family, period)
            .await
            .ok_or(PipelineError::SourceUnavailable { family, period })?;
        let transformed = normalizer::transform(family, &file.sheet, &file.file_name, self.identity)?;
        Ok(transformed.records)
    }

    async fn collect_single(
        &self,
        family: ReportFamily,
        period: Option<PeriodKey>,
    ) -> Result<(Vec<PeriodKey>, Vec<NormalizedRecord>), PipelineError> {
        let period = match period {
            Some(p) => p,
            None => self
                .source
                .latest(family)
                .await?
                .ok_or(PipelineError::NoFiles(family))?,
        };
        tracing::info!(%family, %period, "processing period");
        let records = self.normalize_period(family, period).await?;
        Ok((vec![period], records))
    }

    async fn collect_bulk(
        &self,
        family: ReportFamily,
    ) -> Result<(Vec<PeriodKey>, Vec<PeriodFailure>, Vec<NormalizedRecord>), PipelineError> {
        let periods = self.source.discover(family).await?;
        if periods.is_empty() {
            return Err(PipelineError::NoFiles(family));
        }

        let mut loaded = Vec::new();
        let mut failed = Vec::new();
        let mut records = Vec::new();

        for period in periods {
            match self.normalize_period(family, period).await {
                Ok(batch) => {
                    tracing::info!(%family, %period, records = batch.len(), "period normalized");
                    loaded.push(period);
                    records.extend(batch);
                }
                Err(e) => {
                    tracing::warn!(%family, %period, error = %e, "skipping period");
                    failed.push(PeriodFailure {
                        period,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if loaded.is_empty() {
            return Err(PipelineError::NothingLoaded {
                family,
                failed: failed.len(),
            });
        }
        Ok((loaded, failed, records))
    }

    pub async fn run(&self, family: ReportFamily, mode: RunMode) -> Result<RunOutput, PipelineError> {
        let (loaded, failed, records) = match mode {
            RunMode::Single(period) => {
                let (loaded, records) = self.collect_single(family, period).await?;
                (loaded, Vec::new(), records)
            }
            RunMode::Bulk => self.collect_bulk(family).await?,
        };

        let (load_method, rows) = match self.sink {
            Some(sink) => {
                let method = self.load_method_for(mode);
                (Some(method), load_records(sink, family, &records, method).await?)
            }
            None => (None, records.len()),
        };

        Ok(RunOutput {
            report: RunReport {
                pipeline: pipeline_name(family, mode),
                family,
                load_method,
                loaded,
                failed,
                rows,
            },
            records,
        })
    }
}

fn report_detail(report: &RunReport) -> String {
    match serde_json::to_string(report) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(error = %e, "run report not serializable, journaling debug form");
            format!("{:?}", report)
        }
    }
}

/// Run the pipeline between a journal `start` row and its `success` or
/// `fail` row. The closing row's `logs` holds everything `run_log` captured
/// during the run followed by the JSON report or the error. Pipeline errors
/// are recorded, then returned unchanged.
pub async fn run_journaled(
    journal: &dyn RunJournal,
    pipeline: &Pipeline<'_>,
    family: ReportFamily,
    mode: RunMode,
    run_log: &RunLog,
) -> Result<RunOutput, PipelineError> {
    let handle = journal
        .begin(&pipeline_name(family, mode), &pipeline.describe(family, mode))
        .await?;
    run_log.clear();
    tracing::info!(pipeline = %handle.pipeline_name, run_id = handle.run_id, "run started");

    let result = pipeline.run(family, mode).await;
    let (status, outcome) = match &result {
        Ok(output) => {
            tracing::info!(rows = output.report.rows, "run succeeded");
            (RunStatus::Success, report_detail(&output.report))
        }
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            (RunStatus::Fail, e.to_string())
        }
    };

    let logs = format!("{}{}", run_log.take(), outcome);
    match run_log.persist(&handle, &logs).await {
        Ok(Some(path)) => tracing::info!(path = %path.display(), "run log written"),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "failed to write run log file"),
    }

    match result {
        Ok(output) => {
            journal.complete(&handle, status, &logs).await?;
            Ok(output)
        }
        Err(e) => {
            if let Err(journal_err) = journal.complete(&handle, status, &logs).await {
                tracing::error!(error = %journal_err, "failed to record run failure");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{budget_sheet, MemoryJournal, MemorySink, MemorySource};
    use normalizer::{Cell, RawSheet};
    use tracing_subscriber::layer::SubscriberExt;

    fn q1_2024() -> RawSheet {
        budget_sheet(
            "Del 1 de enero al 31 de marzo de 2024",
            &[("A1. Ingresos de Libre Disposición", 100.0), ("B1. Gasto No Etiquetado", 50.0)],
        )
    }

    fn q2_2024() -> RawSheet {
        budget_sheet(
            "Del 1 de enero al 30 de junio de 2024",
            &[("A1. Ingresos de Libre Disposición", 200.0), ("B1. Gasto No Etiquetado", 80.0)],
        )
    }

    /// An expenditure sheet with no resolvable period header.
    fn headerless_expenditure() -> RawSheet {
        RawSheet::new("F6a COG", vec![vec![Cell::Empty, Cell::from("Sin encabezado")]])
    }

    // -------------------------------------------------------------------------
    // Targets and names
    // -------------------------------------------------------------------------

    #[test]
    fn test_target_parsing() {
        let t: Target = "egresos_bulk".parse().unwrap();
        assert_eq!(t, Target { family: ReportFamily::DetailedExpenditure, bulk: true });
        let t: Target = "balance_single".parse().unwrap();
        assert_eq!(t, Target { family: ReportFamily::BudgetBalance, bulk: false });
        let t: Target = "ingresos_detallado_bulk_pipeline".parse().unwrap();
        assert_eq!(t, Target { family: ReportFamily::DetailedIncome, bulk: true });
        let t: Target = "balance_presupuestario_pipeline".parse().unwrap();
        assert_eq!(t, Target { family: ReportFamily::BudgetBalance, bulk: false });
        assert!(matches!("nomina_bulk".parse::<Target>(), Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_pipeline_names() {
        assert_eq!(
            pipeline_name(ReportFamily::DetailedExpenditure, RunMode::Single(None)),
            "egresos_detallado_pipeline"
        );
        assert_eq!(
            pipeline_name(ReportFamily::BudgetBalance, RunMode::Bulk),
            "balance_presupuestario_bulk_pipeline"
        );
    }

    #[test]
    fn test_default_load_methods() {
        let source = MemorySource::default();
        let pipeline = Pipeline::new(&source);
        assert_eq!(pipeline.load_method_for(RunMode::Single(None)), LoadMethod::Upsert);
        assert_eq!(pipeline.load_method_for(RunMode::Bulk), LoadMethod::Overwrite);
        let pipeline = pipeline.with_load_method(Some(LoadMethod::Insert));
        assert_eq!(pipeline.load_method_for(RunMode::Bulk), LoadMethod::Insert);
    }

    // -------------------------------------------------------------------------
    // Single runs
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_single_uses_latest_period() {
        let source = MemorySource::default()
            .with(ReportFamily::BudgetBalance, 2024, 1, Some(q1_2024()))
            .with(ReportFamily::BudgetBalance, 2024, 2, Some(q2_2024()));
        let sink = MemorySink::default();
        let pipeline = Pipeline::new(&source).with_sink(&sink);

        let out = pipeline.run(ReportFamily::BudgetBalance, RunMode::Single(None)).await.unwrap();
        assert_eq!(out.report.loaded, vec![PeriodKey::new(2024, 2).unwrap()]);
        assert_eq!(out.report.load_method, Some(LoadMethod::Upsert));
        assert_eq!(out.report.rows, 6);
        assert!(out.records.iter().all(|r| r.year_quarter == "2024_Q2"));
        assert_eq!(sink.row_count(ReportFamily::BudgetBalance), 6);
    }

    #[tokio::test]
    async fn test_single_upsert_rerun_keeps_row_count() {
        let source = MemorySource::default().with(ReportFamily::BudgetBalance, 2024, 1, Some(q1_2024()));
        let sink = MemorySink::default();
        let pipeline = Pipeline::new(&source).with_sink(&sink);
        let mode = RunMode::Single(PeriodKey::new(2024, 1));

        pipeline.run(ReportFamily::BudgetBalance, mode).await.unwrap();
        pipeline.run(ReportFamily::BudgetBalance, mode).await.unwrap();
        assert_eq!(sink.row_count(ReportFamily::BudgetBalance), 6);
    }

    #[tokio::test]
    async fn test_single_missing_period_is_unavailable() {
        let source = MemorySource::default().with(ReportFamily::BudgetBalance, 2024, 1, Some(q1_2024()));
        let pipeline = Pipeline::new(&source);
        let err = pipeline
            .run(ReportFamily::BudgetBalance, RunMode::Single(PeriodKey::new(2023, 4)))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_single_without_files_fails() {
        let source = MemorySource::default();
        let err = Pipeline::new(&source)
            .run(ReportFamily::DetailedIncome, RunMode::Single(None))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoFiles(ReportFamily::DetailedIncome)));
    }

    #[tokio::test]
    async fn test_single_structural_mismatch_propagates() {
        let source = MemorySource::default().with(
            ReportFamily::DetailedExpenditure,
            2024,
            1,
            Some(headerless_expenditure()),
        );
        let err = Pipeline::new(&source)
            .run(ReportFamily::DetailedExpenditure, RunMode::Single(None))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Structural(_)));
    }

    #[tokio::test]
    async fn test_single_impossible_calendar_date_loads() {
        let sheet = budget_sheet(
            "Del 1 de enero al 31 de febrero de 2023",
            &[("A1. Ingresos de Libre Disposición", 100.0), ("B1. Gasto No Etiquetado", 50.0)],
        );
        let source = MemorySource::default()
            .with(ReportFamily::BudgetBalance, 2023, 1, Some(sheet))
            .with(ReportFamily::BudgetBalance, 2024, 1, Some(q1_2024()));
        let sink = MemorySink::default();
        let pipeline = Pipeline::new(&source).with_sink(&sink);

        let out = pipeline
            .run(ReportFamily::BudgetBalance, RunMode::Single(PeriodKey::new(2023, 1)))
            .await
            .unwrap();
        assert!(out.records.iter().all(|r| r.full_date.as_deref() == Some("2023-02-31")));
        assert_eq!(sink.row_count(ReportFamily::BudgetBalance), out.report.rows);

        let out = pipeline.run(ReportFamily::BudgetBalance, RunMode::Bulk).await.unwrap();
        assert_eq!(out.report.loaded.len(), 2);
        assert!(out.report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_reports_records_without_loading() {
        let source = MemorySource::default().with(ReportFamily::BudgetBalance, 2024, 1, Some(q1_2024()));
        let out = Pipeline::new(&source)
            .run(ReportFamily::BudgetBalance, RunMode::Single(None))
            .await
            .unwrap();
        assert_eq!(out.report.load_method, None);
        assert_eq!(out.report.rows, out.records.len());
    }

    // -------------------------------------------------------------------------
    // Bulk runs
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_bulk_skips_failed_periods() {
        let source = MemorySource::default()
            .with(ReportFamily::BudgetBalance, 2023, 4, None)
            .with(ReportFamily::BudgetBalance, 2024, 1, Some(q1_2024()))
            .with(ReportFamily::BudgetBalance, 2024, 2, Some(q2_2024()));
        let sink = MemorySink::default();
        let out = Pipeline::new(&source)
            .with_sink(&sink)
            .run(ReportFamily::BudgetBalance, RunMode::Bulk)
            .await
            .unwrap();

        assert_eq!(out.report.pipeline, "balance_presupuestario_bulk_pipeline");
        assert_eq!(out.report.loaded.len(), 2);
        assert_eq!(out.report.failed.len(), 1);
        assert_eq!(out.report.failed[0].period, PeriodKey::new(2023, 4).unwrap());
        assert_eq!(out.report.load_method, Some(LoadMethod::Overwrite));
        assert_eq!(sink.row_count(ReportFamily::BudgetBalance), 12);
    }

    #[tokio::test]
    async fn test_bulk_all_failed_is_error() {
        let source = MemorySource::default()
            .with(ReportFamily::DetailedExpenditure, 2024, 1, Some(headerless_expenditure()))
            .with(ReportFamily::DetailedExpenditure, 2024, 2, None);
        let err = Pipeline::new(&source)
            .run(ReportFamily::DetailedExpenditure, RunMode::Bulk)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NothingLoaded { failed: 2, .. }));
    }

    #[tokio::test]
    async fn test_bulk_without_files_fails() {
        let source = MemorySource::default();
        let err = Pipeline::new(&source)
            .run(ReportFamily::BudgetBalance, RunMode::Bulk)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoFiles(_)));
    }

    // -------------------------------------------------------------------------
    // Journal wrapper
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_journal_records_success() {
        let source = MemorySource::default().with(ReportFamily::BudgetBalance, 2024, 1, Some(q1_2024()));
        let sink = MemorySink::default();
        let journal = MemoryJournal::default();
        let pipeline = Pipeline::new(&source).with_sink(&sink);

        let run_log = RunLog::new();
        run_journaled(&journal, &pipeline, ReportFamily::BudgetBalance, RunMode::Single(None), &run_log)
            .await
            .unwrap();
        run_journaled(&journal, &pipeline, ReportFamily::BudgetBalance, RunMode::Single(None), &run_log)
            .await
            .unwrap();

        assert_eq!(
            journal.statuses(),
            vec![RunStatus::Start, RunStatus::Success, RunStatus::Start, RunStatus::Success]
        );
        let entries = journal.entries.lock().unwrap();
        assert_eq!(entries[3].run_id, 2);
        assert!(entries[1].logs.as_deref().unwrap().contains("\"rows\":6"));
    }

    #[tokio::test]
    async fn test_journal_records_failure_and_propagates() {
        let source = MemorySource::default().with(ReportFamily::BudgetBalance, 2024, 1, Some(q1_2024()));
        let sink = MemorySink::failing();
        let journal = MemoryJournal::default();
        let pipeline = Pipeline::new(&source).with_sink(&sink);

        let run_log = RunLog::new();
        let err = run_journaled(&journal, &pipeline, ReportFamily::BudgetBalance, RunMode::Bulk, &run_log)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Load(_)));
        assert_eq!(journal.statuses(), vec![RunStatus::Start, RunStatus::Fail]);
        let entries = journal.entries.lock().unwrap();
        assert_eq!(entries[1].pipeline_name, "balance_presupuestario_bulk_pipeline");
        assert!(entries[1].logs.as_deref().unwrap().ends_with(&err.to_string()));
    }

    #[tokio::test]
    async fn test_journal_keeps_captured_run_log() {
        let run_log = RunLog::new();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_writer(run_log.clone())
                .with_ansi(false),
        );
        let _guard = tracing::subscriber::set_default(subscriber);

        let source = MemorySource::default()
            .with(ReportFamily::BudgetBalance, 2023, 4, None)
            .with(ReportFamily::BudgetBalance, 2024, 1, Some(q1_2024()));
        let sink = MemorySink::default();
        let journal = MemoryJournal::default();
        let pipeline = Pipeline::new(&source).with_sink(&sink);

        tracing::info!("logged before the run");
        run_journaled(&journal, &pipeline, ReportFamily::BudgetBalance, RunMode::Bulk, &run_log)
            .await
            .unwrap();

        let entries = journal.entries.lock().unwrap();
        let logs = entries[1].logs.as_deref().unwrap();
        assert!(logs.contains("skipping period"));
        assert!(logs.contains("2023_Q4"));
        assert!(logs.contains("\"rows\":6"));
        assert!(!logs.contains("logged before the run"));
    }

    #[tokio::test]
    async fn test_journal_writes_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let run_log = RunLog::new().with_dir(Some(dir.path().join("logs")));
        let source = MemorySource::default().with(ReportFamily::DetailedIncome, 2024, 1, None);
        let journal = MemoryJournal::default();
        let pipeline = Pipeline::new(&source);

        run_journaled(&journal, &pipeline, ReportFamily::DetailedIncome, RunMode::Single(None), &run_log)
            .await
            .unwrap_err();

        let files: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("ingresos_detallado_pipeline_1_"));
        let text = std::fs::read_to_string(dir.path().join("logs").join(&files[0])).unwrap();
        let entries = journal.entries.lock().unwrap();
        assert_eq!(entries[1].logs.as_deref(), Some(text.as_str()));
    }

    #[test]
    fn test_report_detail_is_json() {
        let report = RunReport {
            pipeline: "balance_presupuestario_pipeline".into(),
            family: ReportFamily::BudgetBalance,
            load_method: Some(LoadMethod::Upsert),
            loaded: vec![PeriodKey::new(2024, 1).unwrap()],
            failed: Vec::new(),
            rows: 6,
        };
        let value: serde_json::Value = serde_json::from_str(&report_detail(&report)).unwrap();
        assert_eq!(value["family"], "balance_presupuestario");
        assert_eq!(value["rows"], 6);
    }

    #[test]
    fn test_describe_config() {
        let source = MemorySource::default();
        let config = Pipeline::new(&source).describe(ReportFamily::DetailedIncome, RunMode::Bulk);
        assert_eq!(config["family"], "ingresos_detallado");
        assert_eq!(config["table"], "nuevo_leon_ingresos_detallado");
        assert_eq!(config["load_method"], "overwrite");
        assert_eq!(config["dry_run"], true);
    }
}

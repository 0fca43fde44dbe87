//! Per-run log capture.
//!
//! `RunLog` is a `MakeWriter` for a second `tracing_subscriber::fmt` layer.
//! Everything the pipeline logs while a run is in flight accumulates in a
//! shared buffer; `run_journaled` drains it into the journal's closing row
//! and, when a log directory is configured, into a file per run.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

use crate::journal::RunHandle;

#[derive(Clone, Default)]
pub struct RunLog {
    buf: Arc<Mutex<Vec<u8>>>,
    dir: Option<PathBuf>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write each run's log to `<dir>/<pipeline>_<run_id>_<timestamp>.log`.
    pub fn with_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dir = dir;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop anything captured before the run began.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drain the captured text.
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Write `text` to this run's log file, if a directory is configured.
    pub async fn persist(&self, handle: &RunHandle, text: &str) -> io::Result<Option<PathBuf>> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        tokio::fs::create_dir_all(dir).await?;
        let path = log_file_path(dir, handle, chrono::Utc::now());
        tokio::fs::write(&path, text).await?;
        Ok(Some(path))
    }
}

fn log_file_path(dir: &Path, handle: &RunHandle, at: chrono::DateTime<chrono::Utc>) -> PathBuf {
    dir.join(format!(
        "{}_{}_{}.log",
        handle.pipeline_name,
        handle.run_id,
        at.format("%Y%m%d_%H%M%S")
    ))
}

pub struct RunLogWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for RunLogWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RunLog {
    type Writer = RunLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RunLogWriter {
            buf: Arc::clone(&self.buf),
        }
    }
}

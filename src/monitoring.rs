//! Optional performance monitoring.
//!
//! When enabled, the recorder times the run and every analyzed file and
//! appends the records to `metrics.json`, one JSON object per line: the run
//! record first, then the file records in analysis order.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use crate::engine::Perf;
use crate::settings::MonitoringSettings;

pub const METRICS_FILE_NAME: &str = "metrics.json";

#[derive(Error, Debug)]
pub enum MonitoringError {
    /// `stop_file` or a second `start_file` does not match the started file.
    #[error("file metrics pairing violation: expected {expected}, got {actual}")]
    PairingViolation { expected: String, actual: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Duration of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetric {
    pub component: String,
    pub duration_ms: u64,
}

/// Timings and size of one analyzed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetric {
    pub component: String,
    pub analysis_time: u64,
    pub parse_time: u64,
    pub ncloc: usize,
    pub ordinal: usize,
}

/// Run-scoped metrics collector; a no-op unless enabled.
#[derive(Debug)]
pub struct MetricsRecorder {
    enabled: bool,
    dir: PathBuf,
    run: Option<(String, Instant)>,
    run_metric: Option<RunMetric>,
    current_file: Option<(String, Instant)>,
    files: Vec<FileMetric>,
}

impl MetricsRecorder {
    pub fn new(settings: &MonitoringSettings) -> Self {
        Self {
            enabled: settings.enabled,
            dir: settings.path.clone().unwrap_or_else(default_dir),
            run: None,
            run_metric: None,
            current_file: None,
            files: Vec::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(&MonitoringSettings::default())
    }

    /// Where metrics are written when the recorder is stopped.
    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(METRICS_FILE_NAME)
    }

    /// File records finalized so far.
    pub fn file_metrics(&self) -> &[FileMetric] {
        &self.files
    }

    pub fn run_metric(&self) -> Option<&RunMetric> {
        self.run_metric.as_ref()
    }

    pub fn start_run(&mut self, component: &str) {
        if self.enabled {
            self.run = Some((component.to_string(), Instant::now()));
        }
    }

    pub fn stop_run(&mut self) {
        if let Some((component, started)) = self.run.take() {
            self.run_metric = Some(RunMetric {
                component,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
    }

    /// Begin timing `id`. Another file still being timed is a pairing
    /// violation.
    pub fn start_file(&mut self, id: &str) -> Result<(), MonitoringError> {
        if !self.enabled {
            return Ok(());
        }
        if let Some((current, _)) = &self.current_file {
            return Err(MonitoringError::PairingViolation {
                expected: format!("stop of {}", current),
                actual: format!("start of {}", id),
            });
        }
        self.current_file = Some((id.to_string(), Instant::now()));
        Ok(())
    }

    /// Finish timing `id`, which must be the file last started.
    pub fn stop_file(&mut self, id: &str, ncloc: usize, perf: Perf) -> Result<(), MonitoringError> {
        if !self.enabled {
            return Ok(());
        }
        match self.current_file.take() {
            Some((current, _)) if current == id => {
                let ordinal = self.files.len();
                self.files.push(FileMetric {
                    component: current,
                    analysis_time: perf.analysis_time,
                    parse_time: perf.parse_time,
                    ncloc,
                    ordinal,
                });
                Ok(())
            }
            other => {
                let expected = other
                    .as_ref()
                    .map(|(current, _)| current.clone())
                    .unwrap_or_else(|| "no started file".to_string());
                self.current_file = other;
                Err(MonitoringError::PairingViolation {
                    expected,
                    actual: id.to_string(),
                })
            }
        }
    }

    /// Persist the collected records. Nothing is written when monitoring is
    /// disabled or no file record was completed.
    pub fn stop(&mut self) -> Result<(), MonitoringError> {
        self.stop_run();
        if !self.enabled || self.files.is_empty() {
            return Ok(());
        }
        if let Some((abandoned, _)) = self.current_file.take() {
            log::debug!("Discarding unfinished file metric for {}", abandoned);
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.metrics_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);

        if let Some(run) = &self.run_metric {
            serde_json::to_writer(&mut writer, run)?;
            writer.write_all(b"\n")?;
        }
        for metric in &self.files {
            serde_json::to_writer(&mut writer, metric)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        log::info!(
            "Wrote {} file metrics to {}",
            self.files.len(),
            path.display()
        );
        self.files.clear();
        self.run_metric = None;
        Ok(())
    }
}

fn default_dir() -> PathBuf {
    ProjectDirs::from("", "", "lintbridge")
        .map(|dirs| dirs.cache_dir().join("monitoring"))
        .unwrap_or_else(|| Path::new(".").to_path_buf())
}

//! Drives one analysis run against the engine.
//!
//! A run initializes the engine, partitions the input files over the
//! configuration graph (or uses one implicit group), then feeds the files
//! to the engine one at a time. Between files it polls cancellation and
//! engine liveness. Progress reporting and monitoring are torn down on
//! every exit path.

mod cancel;

pub use cancel::CancellationToken;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;

use crate::config_graph::{ConfigGraphResolver, DefaultConfig, GroupConfig};
use crate::engine::{AnalysisRequest, AnalysisResponse, Engine, EngineError, Language, RuleConfig};
use crate::input::InputFile;
use crate::monitoring::{MetricsRecorder, MonitoringError};
use crate::progress::ProgressReporter;
use crate::settings::{MonitoringSettings, Settings};

/// Errors that end a run in [`RunState::Failed`].
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("engine rejected linter configuration: {0}")]
    Rejected(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Monitoring(#[from] MonitoringError),
    #[error("run already started")]
    AlreadyStarted,
}

impl From<EngineError> for AnalysisError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Protocol(message) => AnalysisError::Protocol(message),
            EngineError::Rejected(message) => AnalysisError::Rejected(message),
            EngineError::Startup(message) => AnalysisError::EngineUnavailable(message),
            other => AnalysisError::EngineUnavailable(other.to_string()),
        }
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    NotStarted,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// How files are grouped for the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisMode {
    /// One implicit group; configuration paths are forwarded untouched.
    Plain { config_paths: Vec<String> },
    /// Groups come from resolving the configuration graph seeded here.
    Configured { seeds: Vec<PathBuf> },
}

/// Receives engine responses for analyzed files.
pub trait ResultSink {
    fn accept(&mut self, file: &InputFile, response: &AnalysisResponse);
}

impl<F> ResultSink for F
where
    F: FnMut(&InputFile, &AnalysisResponse),
{
    fn accept(&mut self, file: &InputFile, response: &AnalysisResponse) {
        self(file, response)
    }
}

/// Counters describing what a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub state: RunState,
    /// Requests the engine answered.
    pub requests_issued: usize,
    /// Responses routed to the sink.
    pub analyzed_files: usize,
    /// Responses carrying an engine-side error for the file.
    pub failed_files: usize,
    /// Files skipped because no configuration claims them.
    pub skipped_unmatched: usize,
    /// Final value of the progress counter.
    pub progress_tally: usize,
    /// File records produced by monitoring (0 when disabled).
    pub metric_records: usize,
}

/// Options of a run, usually derived from [`Settings`].
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub language: Language,
    pub rules: Vec<RuleConfig>,
    pub environments: Vec<String>,
    pub globals: Vec<String>,
    pub ignore_header_comments: bool,
    pub send_file_content: bool,
    pub progress_interval: Duration,
    pub monitoring: MonitoringSettings,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl AnalysisOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            language: settings.language,
            rules: settings.rules.clone(),
            environments: settings.environments.clone(),
            globals: settings.globals.clone(),
            ignore_header_comments: settings.ignore_header_comments,
            send_file_content: settings.send_file_content,
            progress_interval: settings.progress_interval(),
            monitoring: settings.monitoring.clone(),
        }
    }

    fn component(&self) -> String {
        match self.language {
            Language::JavaScript => "JavaScript analysis".to_string(),
            Language::TypeScript => "TypeScript analysis".to_string(),
        }
    }
}

/// A unit of work: files analyzed with the same configuration paths.
enum Batch<'a> {
    Skip(&'a [InputFile]),
    Analyze {
        label: Option<String>,
        config_paths: Vec<String>,
        files: &'a [InputFile],
    },
}

/// Feeds files to one engine, strictly sequentially.
pub struct Orchestrator<E: Engine> {
    engine: E,
    options: AnalysisOptions,
    runtime: Handle,
    cancellation: CancellationToken,
    state: RunState,
    summary: RunSummary,
}

impl<E: Engine> Orchestrator<E> {
    pub fn new(engine: E, options: AnalysisOptions, runtime: Handle) -> Self {
        Self {
            engine,
            options,
            runtime,
            cancellation: CancellationToken::new(),
            state: RunState::NotStarted,
            summary: RunSummary::default(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Counters of the last run, also available after a failure.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Run the analysis of `files`.
    ///
    /// Returns the summary for completed and cancelled runs; a failed run
    /// returns the error that ended it.
    pub fn run(
        &mut self,
        mode: &AnalysisMode,
        files: &[InputFile],
        sink: &mut dyn ResultSink,
    ) -> Result<RunSummary, AnalysisError> {
        if self.state != RunState::NotStarted {
            return Err(AnalysisError::AlreadyStarted);
        }
        self.state = RunState::Running;

        let mut metrics = MetricsRecorder::new(&self.options.monitoring);
        metrics.start_run(&self.options.component());
        let mut progress: Option<ProgressReporter> = None;
        let mut summary = RunSummary::default();

        let outcome = self.execute(mode, files, sink, &mut metrics, &mut progress, &mut summary);

        if let Some(mut progress) = progress.take() {
            match outcome {
                Ok(RunState::Completed) => progress.stop(),
                _ => progress.cancel(),
            }
            summary.progress_tally = progress.processed();
        }
        summary.metric_records = metrics.file_metrics().len();
        metrics.stop_run();
        if let Err(e) = metrics.stop() {
            log::error!("Failed to write monitoring metrics: {}", e);
        }

        self.state = match &outcome {
            Ok(state) => *state,
            Err(_) => RunState::Failed,
        };
        summary.state = self.state;
        self.summary = summary.clone();

        match outcome {
            Ok(_) => Ok(summary),
            Err(e) => {
                log::error!("Analysis failed: {}", e);
                Err(e)
            }
        }
    }

    fn execute(
        &mut self,
        mode: &AnalysisMode,
        files: &[InputFile],
        sink: &mut dyn ResultSink,
        metrics: &mut MetricsRecorder,
        progress: &mut Option<ProgressReporter>,
        summary: &mut RunSummary,
    ) -> Result<RunState, AnalysisError> {
        self.engine.initialize(
            &self.options.rules,
            &self.options.environments,
            &self.options.globals,
        )?;

        // Keeps the generated file on disk until the run ends.
        let mut default_config: Option<DefaultConfig> = None;
        let groups;
        let batches: Vec<Batch<'_>> = match mode {
            AnalysisMode::Plain { config_paths } => {
                let config_paths = if config_paths.is_empty() {
                    match self.default_config(files) {
                        Ok(config) => {
                            vec![default_config.insert(config).path().to_string_lossy().into_owned()]
                        }
                        Err(e) => {
                            log::warn!("Failed to create a default tsconfig.json: {}", e);
                            Vec::new()
                        }
                    }
                } else {
                    config_paths.clone()
                };
                vec![Batch::Analyze {
                    label: None,
                    config_paths,
                    files,
                }]
            }
            AnalysisMode::Configured { seeds } => {
                let seeds = if seeds.is_empty() {
                    match self.default_config(files) {
                        Ok(config) => vec![default_config.insert(config).path().to_path_buf()],
                        Err(e) => {
                            log::debug!("Failed to create a default tsconfig.json: {}", e);
                            log::warn!("No tsconfig.json file found, analysis will be skipped.");
                            return Ok(RunState::Completed);
                        }
                    }
                } else {
                    seeds.clone()
                };
                groups = ConfigGraphResolver::new(&mut self.engine).resolve_groups(&seeds, files)?;
                groups
                    .iter()
                    .map(|group| match &group.config {
                        GroupConfig::Unmatched => Batch::Skip(&group.files),
                        GroupConfig::Config(config) => Batch::Analyze {
                            label: Some(config.to_string()),
                            config_paths: vec![config.path.to_string_lossy().into_owned()],
                            files: &group.files,
                        },
                    })
                    .collect()
            }
        };

        let targets: Vec<String> = batches
            .iter()
            .filter_map(|batch| match batch {
                Batch::Analyze { files, .. } => Some(files.iter().map(|f| f.to_string())),
                Batch::Skip(_) => None,
            })
            .flatten()
            .collect();
        let reporter = progress.insert(ProgressReporter::start(
            &self.runtime,
            &self.options.component(),
            targets,
            self.options.progress_interval,
        ));

        let mut analyzed_batches = 0;
        for batch in &batches {
            let (label, config_paths, batch_files) = match batch {
                Batch::Skip(skipped) => {
                    summary.skipped_unmatched += skipped.len();
                    log::info!("Skipping {} files with no tsconfig.json", skipped.len());
                    log::debug!(
                        "Skipped files: {}",
                        skipped
                            .iter()
                            .map(|f| f.to_string())
                            .collect::<Vec<_>>()
                            .join("\n")
                    );
                    continue;
                }
                Batch::Analyze {
                    label,
                    config_paths,
                    files,
                } => (label, config_paths, *files),
            };

            if analyzed_batches > 0 {
                self.engine.reset_config_context()?;
            }
            analyzed_batches += 1;

            match label {
                Some(config) => log::info!(
                    "Analyzing {} files using tsconfig: {}",
                    batch_files.len(),
                    config
                ),
                None => log::info!("Analyzing {} files", batch_files.len()),
            }

            for file in batch_files {
                if self.cancellation.is_cancelled() {
                    log::info!("Analysis interrupted because the run was cancelled");
                    return Ok(RunState::Cancelled);
                }
                if !self.engine.is_alive() {
                    return Err(AnalysisError::EngineUnavailable(
                        "engine is not answering".to_string(),
                    ));
                }
                self.analyze_file(file, config_paths, sink, metrics, summary)?;
                reporter.next_file();
            }
        }

        Ok(RunState::Completed)
    }

    fn default_config(&self, files: &[InputFile]) -> std::io::Result<DefaultConfig> {
        log::info!("No tsconfig.json found, using a generated default configuration");
        DefaultConfig::create(self.options.language, files)
    }

    fn analyze_file(
        &mut self,
        file: &InputFile,
        config_paths: &[String],
        sink: &mut dyn ResultSink,
        metrics: &mut MetricsRecorder,
        summary: &mut RunSummary,
    ) -> Result<(), AnalysisError> {
        let file_content = file
            .request_contents(self.options.send_file_content)
            .map_err(|source| AnalysisError::Read {
                path: file.path.clone(),
                source,
            })?;
        let request = AnalysisRequest {
            language: self.options.language,
            file_path: file.path.clone(),
            file_type: file.kind,
            file_content,
            ignore_header_comments: self.options.ignore_header_comments,
            ts_configs: config_paths.to_vec(),
        };

        let id = file.to_string();
        metrics.start_file(&id)?;
        let response = self.engine.analyze(&request).map_err(|e| {
            log::error!("Failed to get response while analyzing {}: {}", file, e);
            AnalysisError::from(e)
        })?;
        summary.requests_issued += 1;

        match &response.error {
            Some(error) => {
                log::error!("Engine failed to analyze {}: {}", file, error);
                summary.failed_files += 1;
            }
            None => {
                if let Some(parsing_error) = &response.parsing_error {
                    log::warn!(
                        "Failed to parse file [{}] at line {}: {}",
                        file,
                        parsing_error
                            .line
                            .map(|l| l.to_string())
                            .unwrap_or_else(|| "?".to_string()),
                        parsing_error.message
                    );
                }
                sink.accept(file, &response);
                summary.analyzed_files += 1;
            }
        }

        metrics.stop_file(
            &id,
            response.metrics.ncloc.len(),
            response.perf.unwrap_or_default(),
        )?;
        Ok(())
    }
}

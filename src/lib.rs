//! lintbridge - orchestration layer for an external lint engine.
//!
//! The actual parsing and rule checking happen in a separate bridge
//! process. lintbridge drives it: it configures the linter, resolves the
//! project's configuration graph into groups of files, feeds the files to
//! the engine one at a time and collects the responses, while reporting
//! progress and optionally recording performance metrics.
//!
//! # Architecture
//!
//! - `engine`: the [`Engine`] trait, its HTTP client and the bridge process
//! - `config_graph`: tsconfig graph resolution and file partitioning
//! - `orchestrator`: one analysis run, cancellation and run state
//! - `progress`: periodic progress logging
//! - `monitoring`: per-run and per-file metrics written to `metrics.json`
//! - `settings`: YAML settings schema
//! - `input`: source file collection
//! - `report`: output formatting (text, JSON)

pub mod cli;
pub mod config_graph;
pub mod engine;
pub mod input;
pub mod monitoring;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod settings;

pub use config_graph::{ConfigFile, ConfigGraphResolver, ConfigGroup, GroupConfig};
pub use engine::{
    AnalysisRequest, AnalysisResponse, Engine, EngineError, FileKind, HttpEngine, Language,
    RuleConfig,
};
pub use input::InputFile;
pub use monitoring::{MetricsRecorder, MonitoringError};
pub use orchestrator::{
    AnalysisError, AnalysisMode, AnalysisOptions, CancellationToken, Orchestrator, ResultSink,
    RunState, RunSummary,
};
pub use progress::ProgressReporter;
pub use settings::Settings;

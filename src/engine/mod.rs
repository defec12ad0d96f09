//! Client side of the external analysis engine.
//!
//! The engine is a single, stateful bridge process (usually a Node.js
//! script) that performs the actual parsing and linting. It keeps one
//! "current configuration" context, so every call goes through `&mut self`
//! and a new configuration group must be announced with
//! [`Engine::reset_config_context`].

mod http;
mod process;
pub mod protocol;

pub use http::HttpEngine;
pub use process::{parse_log_line, EngineProcess};
pub use protocol::{
    AnalysisRequest, AnalysisResponse, FileKind, FileMetrics, Issue, IssueLocation, Language,
    ParsingError, Perf, RuleConfig,
};

use std::path::Path;
use thiserror::Error;

use crate::config_graph::ConfigFile;

/// Errors that can occur while talking to the engine.
///
/// None of these are retried; callers treat every variant as fatal for the
/// operation that produced it.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("request to engine timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("engine rejected request: {0}")]
    Rejected(String),
    #[error("engine failed to start: {0}")]
    Startup(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operations offered by the analysis engine.
pub trait Engine {
    /// Configure the linter for the run. Must precede any analysis.
    fn initialize(
        &mut self,
        rules: &[RuleConfig],
        environments: &[String],
        globals: &[String],
    ) -> Result<(), EngineError>;

    /// Cheap liveness probe.
    fn is_alive(&mut self) -> bool;

    /// Parse one configuration file. References are returned unresolved.
    fn load_config(&mut self, path: &Path) -> Result<ConfigFile, EngineError>;

    /// Analyze one file, blocking until the engine answers.
    fn analyze(&mut self, request: &AnalysisRequest) -> Result<AnalysisResponse, EngineError>;

    /// Drop the engine's per-configuration state before a new group.
    fn reset_config_context(&mut self) -> Result<(), EngineError>;

    /// Shut the engine down. Engines not owned by this process ignore it.
    fn close(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn initialize(
        &mut self,
        rules: &[RuleConfig],
        environments: &[String],
        globals: &[String],
    ) -> Result<(), EngineError> {
        (**self).initialize(rules, environments, globals)
    }

    fn is_alive(&mut self) -> bool {
        (**self).is_alive()
    }

    fn load_config(&mut self, path: &Path) -> Result<ConfigFile, EngineError> {
        (**self).load_config(path)
    }

    fn analyze(&mut self, request: &AnalysisRequest) -> Result<AnalysisResponse, EngineError> {
        (**self).analyze(request)
    }

    fn reset_config_context(&mut self) -> Result<(), EngineError> {
        (**self).reset_config_context()
    }

    fn close(&mut self) -> Result<(), EngineError> {
        (**self).close()
    }
}

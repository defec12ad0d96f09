//! Scripted in-process engine shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use lintbridge::config_graph::ConfigFile;
use lintbridge::engine::{
    AnalysisRequest, AnalysisResponse, Engine, EngineError, FileMetrics, Issue, Perf, RuleConfig,
};

/// One call received by the engine, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Initialize,
    LoadConfig(PathBuf),
    Analyze(PathBuf, Vec<String>),
    Reset,
}

/// Engine answering from a fixed script of configurations and failures.
#[derive(Default)]
pub struct ScriptedEngine {
    pub configs: HashMap<PathBuf, ConfigFile>,
    /// Files whose response carries an engine-side error.
    pub failing_files: HashSet<PathBuf>,
    /// Engine stops answering once this many files were analyzed.
    pub alive_for: Option<usize>,
    pub calls: Vec<Call>,
    /// Contents of configuration files read from disk, by path.
    pub on_disk: HashMap<PathBuf, serde_json::Value>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ConfigFile) -> Self {
        self.configs.insert(config.path.clone(), config);
        self
    }

    pub fn loaded(&self) -> Vec<PathBuf> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::LoadConfig(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn analyzed(&self) -> Vec<PathBuf> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Analyze(path, _) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn resets(&self) -> usize {
        self.calls.iter().filter(|c| **c == Call::Reset).count()
    }

    /// Parse a configuration the script does not know from disk, the way
    /// the bridge would.
    fn read_from_disk(&mut self, path: &Path) -> Option<ConfigFile> {
        let content = std::fs::read_to_string(path).ok()?;
        let json: serde_json::Value = serde_json::from_str(&content).ok()?;
        let mut config = ConfigFile::new(path);
        if let Some(files) = json["files"].as_array() {
            config.files = files
                .iter()
                .filter_map(|f| f.as_str().map(PathBuf::from))
                .collect();
        }
        self.on_disk.insert(path.to_path_buf(), json);
        Some(config)
    }
}

impl Engine for ScriptedEngine {
    fn initialize(
        &mut self,
        _rules: &[RuleConfig],
        _environments: &[String],
        _globals: &[String],
    ) -> Result<(), EngineError> {
        self.calls.push(Call::Initialize);
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        match self.alive_for {
            Some(limit) => self.analyzed().len() < limit,
            None => true,
        }
    }

    fn load_config(&mut self, path: &Path) -> Result<ConfigFile, EngineError> {
        self.calls.push(Call::LoadConfig(path.to_path_buf()));
        if let Some(config) = self.configs.get(path) {
            return Ok(config.clone());
        }
        self.read_from_disk(path)
            .ok_or_else(|| EngineError::Protocol(format!("no such config: {}", path.display())))
    }

    fn analyze(&mut self, request: &AnalysisRequest) -> Result<AnalysisResponse, EngineError> {
        self.calls.push(Call::Analyze(
            request.file_path.clone(),
            request.ts_configs.clone(),
        ));
        for ts_config in &request.ts_configs {
            let path = PathBuf::from(ts_config);
            if !self.configs.contains_key(&path) && !self.on_disk.contains_key(&path) {
                self.read_from_disk(&path);
            }
        }
        let mut response = AnalysisResponse {
            issues: vec![Issue {
                rule_id: "no-var".to_string(),
                line: 1,
                message: "Unexpected var".to_string(),
                ..Default::default()
            }],
            metrics: FileMetrics {
                ncloc: vec![1, 2, 3],
                ..Default::default()
            },
            perf: Some(Perf {
                parse_time: 1,
                analysis_time: 2,
            }),
            ..Default::default()
        };
        if self.failing_files.contains(&request.file_path) {
            response.error = Some("analysis crashed".to_string());
        }
        Ok(response)
    }

    fn reset_config_context(&mut self) -> Result<(), EngineError> {
        self.calls.push(Call::Reset);
        Ok(())
    }
}

/// A configuration at `path` referencing `references`, claiming `include`.
pub fn config(path: &str, references: &[&str], include: &[&str]) -> ConfigFile {
    let mut config = ConfigFile::new(path);
    config.references = references.iter().map(|r| r.to_string()).collect();
    config.include = Some(include.iter().map(|i| i.to_string()).collect());
    config
}

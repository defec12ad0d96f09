//! Wire types exchanged with the bridge server.
//!
//! All bodies are JSON with camelCase keys. Response types default every
//! optional field so that older bridge versions that omit data still decode.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which analysis endpoint a request is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    JavaScript,
    TypeScript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
        }
    }

    /// Endpoint path used for per-file analysis.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Language::JavaScript => "analyze-js",
            Language::TypeScript => "analyze-ts",
        }
    }

    /// File extensions (without dot) analyzed for this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::JavaScript => &["js", "jsx", "mjs", "cjs", "vue"],
            Language::TypeScript => &["ts", "tsx", "mts", "cts"],
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "javascript" | "js" => Ok(Language::JavaScript),
            "typescript" | "ts" => Ok(Language::TypeScript),
            _ => Err(format!("unknown language: {}", s)),
        }
    }
}

/// Main or test source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileKind {
    #[default]
    Main,
    Test,
}

/// A rule activated for the run, with its parameters.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleConfig {
    pub key: String,
    #[serde(default)]
    pub configurations: Vec<serde_json::Value>,
}

impl RuleConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            configurations: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct InitLinterRequest<'a> {
    pub rules: &'a [RuleConfig],
    pub environments: &'a [String],
    pub globals: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct LoadConfigRequest<'a> {
    pub tsconfig: &'a str,
}

/// Raw answer of the configuration endpoint, before it becomes a `ConfigFile`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadConfigResponse {
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub project_references: Vec<String>,
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One file to analyze.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(skip)]
    pub language: Language,
    pub file_path: PathBuf,
    pub file_type: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,
    pub ignore_header_comments: bool,
    pub ts_configs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub metrics: FileMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsing_error: Option<ParsingError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perf: Option<Perf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub rule_id: String,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default)]
    pub end_line: Option<u32>,
    #[serde(default)]
    pub end_column: Option<u32>,
    pub message: String,
    #[serde(default)]
    pub secondary_locations: Vec<IssueLocation>,
    #[serde(default)]
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLocation {
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
    #[serde(default)]
    pub message: Option<String>,
}

/// Size and complexity measures computed by the engine.
///
/// Line-based measures are lists of 1-based line numbers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetrics {
    #[serde(default)]
    pub ncloc: Vec<u32>,
    #[serde(default)]
    pub comment_lines: Vec<u32>,
    #[serde(default)]
    pub nosonar_lines: Vec<u32>,
    #[serde(default)]
    pub executable_lines: Vec<u32>,
    #[serde(default)]
    pub functions: u32,
    #[serde(default)]
    pub statements: u32,
    #[serde(default)]
    pub classes: u32,
    #[serde(default)]
    pub complexity: u32,
    #[serde(default)]
    pub cognitive_complexity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsingError {
    #[serde(default)]
    pub line: Option<u32>,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Engine-side timings in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Perf {
    #[serde(default)]
    pub parse_time: u64,
    #[serde(default)]
    pub analysis_time: u64,
}

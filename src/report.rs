//! Output formatting for analysis results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::{AnalysisResponse, FileKind, Issue};
use crate::input::InputFile;
use crate::orchestrator::{ResultSink, RunState, RunSummary};

/// Issues and measures of one analyzed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub path: String,
    pub kind: FileKind,
    pub issues: Vec<Issue>,
    pub ncloc: usize,
    pub comment_lines: usize,
    pub complexity: u32,
    pub cognitive_complexity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsing_error: Option<String>,
}

/// Result sink keeping every response for reporting at the end of the run.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub files: Vec<FileReport>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue_count(&self) -> usize {
        self.files.iter().map(|f| f.issues.len()).sum()
    }

    /// Issue counts per rule, sorted by rule key.
    pub fn issues_by_rule(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for issue in self.files.iter().flat_map(|f| &f.issues) {
            *counts.entry(issue.rule_id.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl ResultSink for CollectingSink {
    fn accept(&mut self, file: &InputFile, response: &AnalysisResponse) {
        self.files.push(FileReport {
            path: file.to_string(),
            kind: file.kind,
            issues: response.issues.clone(),
            ncloc: response.metrics.ncloc.len(),
            comment_lines: response.metrics.comment_lines.len(),
            complexity: response.metrics.complexity,
            cognitive_complexity: response.metrics.cognitive_complexity,
            parsing_error: response.parsing_error.as_ref().map(|e| e.message.clone()),
        });
    }
}

/// JSON report structure.
#[derive(Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    pub state: String,
    pub files_analyzed: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub issue_count: usize,
    pub files: Vec<FileReport>,
}

/// Build the JSON report for a finished run.
pub fn build_json(path: &str, sink: &CollectingSink, summary: &RunSummary) -> JsonReport {
    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        state: state_name(summary.state).to_string(),
        files_analyzed: summary.analyzed_files,
        files_failed: summary.failed_files,
        files_skipped: summary.skipped_unmatched,
        issue_count: sink.issue_count(),
        files: sink
            .files
            .iter()
            .filter(|f| !f.issues.is_empty() || f.parsing_error.is_some())
            .cloned()
            .collect(),
    }
}

/// Write results in JSON format.
pub fn write_json(path: &str, sink: &CollectingSink, summary: &RunSummary) -> anyhow::Result<()> {
    let report = build_json(path, sink, summary);
    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

fn state_name(state: RunState) -> &'static str {
    match state {
        RunState::NotStarted => "not_started",
        RunState::Running => "running",
        RunState::Completed => "completed",
        RunState::Cancelled => "cancelled",
        RunState::Failed => "failed",
    }
}

/// Write results in pretty (human-readable) format.
pub fn write_pretty(path: &str, sink: &CollectingSink, summary: &RunSummary) {
    println!();
    print!("  ");
    print!("{}", "lintbridge".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Analyzing: ".dimmed());
    println!("{}", path);
    println!();

    let with_findings: Vec<&FileReport> = sink
        .files
        .iter()
        .filter(|f| !f.issues.is_empty() || f.parsing_error.is_some())
        .collect();

    for file in &with_findings {
        write_file(file);
    }

    let by_rule = sink.issues_by_rule();
    if !by_rule.is_empty() {
        println!("  {}", "Rules:".bold());
        for (rule, count) in &by_rule {
            let plural = if *count != 1 { "s" } else { "" };
            println!("    {:<30} {:>4} issue{}", rule, count, plural);
        }
        println!();
    }

    write_final_status(sink, summary);
    println!();
}

fn write_file(file: &FileReport) {
    println!("  {}", file.path.blue());
    if let Some(error) = &file.parsing_error {
        println!("    {} {}", "PARSE".red(), error);
    }
    for issue in &file.issues {
        print!("    {}", format!("{:>5}:{:<4}", issue.line, issue.column).dimmed());
        print!(" {:<28}", issue.rule_id.yellow());
        println!(" {}", issue.message);
    }
    println!();
}

fn write_final_status(sink: &CollectingSink, summary: &RunSummary) {
    match summary.state {
        RunState::Completed => print!("  {}", "✓ DONE".green()),
        RunState::Cancelled => print!("  {}", "■ CANCELLED".yellow()),
        _ => print!("  {}", "✗ FAILED".red()),
    }

    print!(
        "  {} files analyzed, {} issues",
        summary.analyzed_files,
        sink.issue_count()
    );
    if summary.failed_files > 0 {
        print!("  {}", format!("({} failed)", summary.failed_files).red());
    }
    if summary.skipped_unmatched > 0 {
        print!(
            "  {}",
            format!("({} without tsconfig)", summary.skipped_unmatched).dimmed()
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FileMetrics, ParsingError};

    fn response_with(rules: &[&str]) -> AnalysisResponse {
        AnalysisResponse {
            issues: rules
                .iter()
                .map(|r| Issue {
                    rule_id: r.to_string(),
                    line: 1,
                    message: "msg".to_string(),
                    ..Default::default()
                })
                .collect(),
            metrics: FileMetrics {
                ncloc: vec![1, 2],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_collecting_sink_counts() {
        let mut sink = CollectingSink::new();
        sink.accept(&InputFile::main("/p/a.js"), &response_with(&["no-eval", "no-var"]));
        sink.accept(&InputFile::main("/p/b.js"), &response_with(&["no-var"]));

        assert_eq!(sink.issue_count(), 3);
        assert_eq!(sink.issues_by_rule()["no-var"], 2);
        assert_eq!(sink.files[0].ncloc, 2);
    }

    #[test]
    fn test_json_report_lists_files_with_findings() {
        let mut sink = CollectingSink::new();
        sink.accept(&InputFile::main("/p/a.js"), &response_with(&["no-eval"]));
        sink.accept(&InputFile::main("/p/clean.js"), &response_with(&[]));
        let mut broken = response_with(&[]);
        broken.parsing_error = Some(ParsingError {
            line: Some(2),
            message: "Unexpected token".to_string(),
            code: None,
        });
        sink.accept(&InputFile::main("/p/broken.js"), &broken);

        let summary = RunSummary {
            state: RunState::Completed,
            analyzed_files: 3,
            requests_issued: 3,
            ..Default::default()
        };
        let report = build_json("/p", &sink, &summary);

        assert_eq!(report.state, "completed");
        assert_eq!(report.files_analyzed, 3);
        assert_eq!(report.issue_count, 1);
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[1].parsing_error.as_deref(), Some("Unexpected token"));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"ruleId\":\"no-eval\""));
    }
}

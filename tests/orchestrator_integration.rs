//! Integration tests for analysis runs against a scripted engine.

mod common;

use std::path::PathBuf;

use common::{config, Call, ScriptedEngine};
use lintbridge::engine::{AnalysisResponse, Language};
use lintbridge::input::InputFile;
use lintbridge::orchestrator::{AnalysisError, AnalysisMode, AnalysisOptions, Orchestrator, RunState};
use lintbridge::report::CollectingSink;
use tokio::runtime::Runtime;

fn typescript_options() -> AnalysisOptions {
    AnalysisOptions {
        language: Language::TypeScript,
        ..Default::default()
    }
}

fn five_files() -> Vec<InputFile> {
    (1..=5)
        .map(|i| InputFile::main(format!("/p/src/file{}.js", i)))
        .collect()
}

fn plain() -> AnalysisMode {
    AnalysisMode::Plain {
        config_paths: vec!["/p/tsconfig.json".to_string()],
    }
}

#[test]
fn test_plain_run_forwards_config_paths() {
    let rt = Runtime::new().unwrap();
    let mut orch = Orchestrator::new(ScriptedEngine::new(), AnalysisOptions::default(), rt.handle().clone());
    let mut sink = CollectingSink::new();

    let summary = orch.run(&plain(), &five_files(), &mut sink).expect("run should succeed");

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.requests_issued, 5);
    assert_eq!(summary.progress_tally, 5);
    assert_eq!(sink.files.len(), 5);
    assert_eq!(sink.issue_count(), 5);
    assert_eq!(orch.engine().calls[0], Call::Initialize);
    assert!(orch.engine().calls.iter().all(|c| match c {
        Call::Analyze(_, configs) => configs == &vec!["/p/tsconfig.json".to_string()],
        _ => true,
    }));
    assert_eq!(orch.engine().resets(), 0);
}

#[test]
fn test_cancellation_stops_after_current_file() {
    let rt = Runtime::new().unwrap();
    let mut orch = Orchestrator::new(ScriptedEngine::new(), AnalysisOptions::default(), rt.handle().clone());
    let token = orch.cancellation_token();

    let mut seen = 0;
    let mut sink = |_: &InputFile, _: &AnalysisResponse| {
        seen += 1;
        if seen == 2 {
            token.cancel();
        }
    };
    let summary = orch.run(&plain(), &five_files(), &mut sink).unwrap();

    assert_eq!(summary.state, RunState::Cancelled);
    assert_eq!(summary.requests_issued, 2);
    assert_eq!(summary.progress_tally, 2);
    assert_eq!(orch.engine().analyzed().len(), 2);
}

#[test]
fn test_cancelled_before_start_issues_no_request() {
    let rt = Runtime::new().unwrap();
    let mut orch = Orchestrator::new(ScriptedEngine::new(), AnalysisOptions::default(), rt.handle().clone());
    orch.cancellation_token().cancel();

    let summary = orch
        .run(&plain(), &five_files(), &mut CollectingSink::new())
        .unwrap();

    assert_eq!(summary.state, RunState::Cancelled);
    assert_eq!(summary.requests_issued, 0);
}

#[test]
fn test_dead_engine_fails_run() {
    let rt = Runtime::new().unwrap();
    let engine = ScriptedEngine {
        alive_for: Some(2),
        ..Default::default()
    };
    let mut orch = Orchestrator::new(engine, AnalysisOptions::default(), rt.handle().clone());
    let mut sink = CollectingSink::new();

    let err = orch.run(&plain(), &five_files(), &mut sink).unwrap_err();

    assert!(matches!(err, AnalysisError::EngineUnavailable(_)));
    assert_eq!(orch.state(), RunState::Failed);
    assert_eq!(orch.summary().requests_issued, 2);
    assert_eq!(orch.summary().progress_tally, 2);
    assert_eq!(sink.files.len(), 2);
    assert_eq!(
        orch.engine().analyzed(),
        vec![PathBuf::from("/p/src/file1.js"), PathBuf::from("/p/src/file2.js")]
    );
}

#[test]
fn test_engine_side_file_error_is_counted() {
    let rt = Runtime::new().unwrap();
    let mut engine = ScriptedEngine::new();
    engine.failing_files.insert(PathBuf::from("/p/src/file3.js"));
    let mut orch = Orchestrator::new(engine, AnalysisOptions::default(), rt.handle().clone());
    let mut sink = CollectingSink::new();

    let summary = orch.run(&plain(), &five_files(), &mut sink).unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.requests_issued, 5);
    assert_eq!(summary.analyzed_files, 4);
    assert_eq!(summary.failed_files, 1);
    assert_eq!(sink.files.len(), 4);
}

#[test]
fn test_configured_run_resets_between_groups() {
    let rt = Runtime::new().unwrap();
    let engine = ScriptedEngine::new()
        .with_config(config("/p/app/tsconfig.json", &["../lib"], &["**/*.ts"]))
        .with_config(config("/p/lib/tsconfig.json", &[], &["**/*.ts"]));
    let mut orch = Orchestrator::new(engine, typescript_options(), rt.handle().clone());

    let files = vec![
        InputFile::main("/p/app/main.ts"),
        InputFile::main("/p/lib/util.ts"),
        InputFile::main("/p/other/orphan.ts"),
    ];
    let mode = AnalysisMode::Configured {
        seeds: vec![PathBuf::from("/p/app/tsconfig.json")],
    };
    let summary = orch.run(&mode, &files, &mut CollectingSink::new()).unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.requests_issued, 2);
    assert_eq!(summary.skipped_unmatched, 1);
    assert_eq!(summary.progress_tally, 2);

    let calls = &orch.engine().calls;
    let tail: Vec<Call> = calls
        .iter()
        .filter(|c| !matches!(c, Call::Initialize | Call::LoadConfig(_)))
        .cloned()
        .collect();
    assert_eq!(
        tail,
        vec![
            Call::Analyze(
                PathBuf::from("/p/app/main.ts"),
                vec!["/p/app/tsconfig.json".to_string()]
            ),
            Call::Reset,
            Call::Analyze(
                PathBuf::from("/p/lib/util.ts"),
                vec!["/p/lib/tsconfig.json".to_string()]
            ),
        ]
    );
    assert!(!orch.engine().analyzed().contains(&PathBuf::from("/p/other/orphan.ts")));
}

#[test]
fn test_missing_file_with_send_content_fails() {
    let rt = Runtime::new().unwrap();
    let options = AnalysisOptions {
        send_file_content: true,
        ..Default::default()
    };
    let mut orch = Orchestrator::new(ScriptedEngine::new(), options, rt.handle().clone());

    let err = orch
        .run(
            &plain(),
            &[InputFile::main("/nonexistent/lintbridge/a.js")],
            &mut CollectingSink::new(),
        )
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Read { .. }));
    assert_eq!(orch.summary().requests_issued, 0);
}

#[test]
fn test_plain_run_without_configs_uses_generated_config() {
    let rt = Runtime::new().unwrap();
    let mut orch = Orchestrator::new(ScriptedEngine::new(), AnalysisOptions::default(), rt.handle().clone());
    let mode = AnalysisMode::Plain {
        config_paths: vec![],
    };

    let summary = orch.run(&mode, &five_files(), &mut CollectingSink::new()).unwrap();
    assert_eq!(summary.requests_issued, 5);

    let engine = orch.engine();
    let generated: Vec<&Vec<String>> = engine
        .calls
        .iter()
        .filter_map(|c| match c {
            Call::Analyze(_, configs) => Some(configs),
            _ => None,
        })
        .collect();
    assert_eq!(generated.len(), 5);
    assert_eq!(generated[0].len(), 1);
    assert!(generated.iter().all(|configs| *configs == generated[0]));

    let path = PathBuf::from(&generated[0][0]);
    let content = &engine.on_disk[&path];
    assert_eq!(content["compilerOptions"]["allowJs"], serde_json::json!(true));
    assert_eq!(content["files"].as_array().unwrap().len(), 5);
    assert!(!path.exists());
}

#[test]
fn test_configured_run_without_seeds_uses_generated_config() {
    let rt = Runtime::new().unwrap();
    let mut orch = Orchestrator::new(ScriptedEngine::new(), typescript_options(), rt.handle().clone());
    let files = vec![InputFile::main("/p/a.ts"), InputFile::main("/p/lib/b.ts")];

    let summary = orch
        .run(&AnalysisMode::Configured { seeds: vec![] }, &files, &mut CollectingSink::new())
        .unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.requests_issued, 2);
    assert_eq!(summary.skipped_unmatched, 0);

    let loaded = orch.engine().loaded();
    assert_eq!(loaded.len(), 1);
    assert_eq!(
        orch.engine().analyzed(),
        vec![PathBuf::from("/p/a.ts"), PathBuf::from("/p/lib/b.ts")]
    );
    let content = &orch.engine().on_disk[&loaded[0]];
    assert!(content["compilerOptions"].as_object().unwrap().is_empty());
}

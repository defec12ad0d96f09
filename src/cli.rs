//! Command-line interface for lintbridge.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config_graph::DEFAULT_CONFIG_NAME;
use crate::engine::{Engine, HttpEngine, Language};
use crate::input;
use crate::orchestrator::{AnalysisMode, AnalysisOptions, CancellationToken, Orchestrator, RunState};
use crate::report::{self, CollectingSink};
use crate::settings::{self, Settings};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Default settings file names to search for.
const DEFAULT_SETTINGS_NAMES: &[&str] = &["lintbridge.yaml", ".lintbridge.yaml"];

/// Static analysis through an external linter bridge.
///
/// lintbridge starts (or connects to) a bridge server that runs the actual
/// linter, resolves the project's tsconfig graph, and feeds every source
/// file to the bridge one at a time.
#[derive(Parser)]
#[command(name = "lintbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct LoggingArgs {
    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a directory through the bridge
    #[command(visible_alias = "lint")]
    Analyze(AnalyzeArgs),
    /// Create a settings file from a template
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Directory or file to analyze
    pub path: PathBuf,

    /// Path to settings YAML file (default: auto-discover)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Override the language from the settings file
    #[arg(short, long)]
    pub language: Option<Language>,

    /// Connect to a running bridge instead of spawning one
    #[arg(long)]
    pub engine_url: Option<String>,

    /// Record performance metrics
    #[arg(long)]
    pub monitoring: bool,

    /// Directory receiving metrics.json (implies --monitoring)
    #[arg(long)]
    pub monitoring_path: Option<PathBuf>,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "lintbridge.yaml")]
    pub output: PathBuf,

    /// Language of the project: javascript or typescript
    #[arg(short, long, default_value = "typescript")]
    pub language: Language,
}

/// Initialize the logger from the verbosity flags; `RUST_LOG` wins.
pub fn init_logging(args: &LoggingArgs) {
    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(args.verbose)
        .init();
}

/// Discover a settings file in the current directory.
fn discover_settings() -> anyhow::Result<PathBuf> {
    for name in DEFAULT_SETTINGS_NAMES {
        let path = PathBuf::from(name);
        if path.exists() {
            return Ok(path);
        }
    }
    anyhow::bail!(
        "no settings file found (looked for {})",
        DEFAULT_SETTINGS_NAMES.join(", ")
    )
}

/// Find every tsconfig.json below `root`, outside dependency folders.
pub fn discover_tsconfigs(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(e.file_type().is_dir()
                && (name == "node_modules" || (e.depth() > 0 && name.starts_with('.'))))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == DEFAULT_CONFIG_NAME)
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Seed configurations: configured paths resolved against `root`, or every
/// tsconfig.json found below it.
fn seed_configs(settings: &Settings, root: &Path) -> Vec<PathBuf> {
    if settings.tsconfig_paths.is_empty() {
        return discover_tsconfigs(root);
    }
    settings
        .tsconfig_paths
        .iter()
        .map(|p| if p.is_absolute() { p.clone() } else { root.join(p) })
        .collect()
}

fn apply_overrides(settings: &mut Settings, args: &AnalyzeArgs) {
    if let Some(language) = args.language {
        settings.language = language;
    }
    if let Some(url) = &args.engine_url {
        settings.engine.url = Some(url.clone());
    }
    if args.monitoring {
        settings.monitoring.enabled = true;
    }
    if let Some(path) = &args.monitoring_path {
        settings.monitoring.enabled = true;
        settings.monitoring.path = Some(path.clone());
    }
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let settings_path = match &args.settings {
        Some(p) => p.clone(),
        None => match discover_settings() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Run 'lintbridge init' to create a settings file");
                return Ok(EXIT_ERROR);
            }
        },
    };

    let mut settings = match Settings::parse_file(&settings_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error parsing settings: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    apply_overrides(&mut settings, args);

    if let Err(e) = settings::validate(&settings) {
        eprintln!("Error: invalid settings: {}", e);
        return Ok(EXIT_ERROR);
    }

    let abs_path = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };

    let (root, files) = if abs_path.is_dir() {
        let files = input::collect_files(&abs_path, settings.language, &settings)?;
        (abs_path.clone(), files)
    } else {
        let root = abs_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| abs_path.clone());
        (root, vec![input::InputFile::main(abs_path.clone())])
    };

    if files.is_empty() {
        log::warn!("No {} files to analyze", settings.language);
        return Ok(EXIT_SUCCESS);
    }

    let seeds = seed_configs(&settings, &root);
    let mode = match settings.language {
        Language::TypeScript => AnalysisMode::Configured { seeds },
        Language::JavaScript => AnalysisMode::Plain {
            config_paths: seeds
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        },
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current file");
            ctrl_c_token.cancel();
        }
    });

    let engine = HttpEngine::from_settings(runtime.handle().clone(), &settings.engine)?;
    let mut orchestrator = Orchestrator::new(
        engine,
        AnalysisOptions::from_settings(&settings),
        runtime.handle().clone(),
    )
    .with_cancellation(token);

    let mut sink = CollectingSink::new();
    let outcome = orchestrator.run(&mode, &files, &mut sink);

    if let Err(e) = orchestrator.engine_mut().close() {
        log::warn!("Failed to close engine: {}", e);
    }

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let path_str = args.path.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(&path_str, &sink, &summary)?,
        _ => report::write_pretty(&path_str, &sink, &summary),
    }

    if summary.state == RunState::Completed && sink.issue_count() == 0 {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    let template = match args.language {
        Language::JavaScript => include_str!("templates/javascript.yaml"),
        Language::TypeScript => include_str!("templates/typescript.yaml"),
    };

    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, template) {
        eprintln!("Error: failed to write settings: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!(
        "Created {} for a {} project",
        args.output.display(),
        args.language
    );
    println!();
    println!("Next steps:");
    println!("  1. Point engine.script at your bridge server");
    println!("  2. Run: lintbridge analyze . --settings {}", args.output.display());

    Ok(EXIT_SUCCESS)
}

//! Settings schema for lintbridge.
//!
//! Settings describe one analysis run: which rules the engine activates,
//! which configuration files seed the project graph, and how the engine
//! and the optional monitoring are set up.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{Language, RuleConfig};

/// Top-level settings definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub environments: Vec<String>,
    #[serde(default)]
    pub globals: Vec<String>,
    /// Seed configuration files (tsconfig.json). Relative paths resolve
    /// against the analyzed directory.
    #[serde(default)]
    pub tsconfig_paths: Vec<PathBuf>,
    /// Skip the leading comment block of every file (default: true)
    #[serde(default = "default_true")]
    pub ignore_header_comments: bool,
    /// Always send file contents instead of letting the engine read from disk
    #[serde(default)]
    pub send_file_content: bool,
    /// Glob patterns for paths to exclude from analysis (e.g., "**/dist/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Seconds between two progress log lines (default: 10)
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
    #[serde(default)]
    pub monitoring: MonitoringSettings,
    #[serde(default)]
    pub engine: EngineSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: Language::default(),
            rules: Vec::new(),
            environments: Vec::new(),
            globals: Vec::new(),
            tsconfig_paths: Vec::new(),
            ignore_header_comments: true,
            send_file_content: false,
            excluded_paths: Vec::new(),
            progress_interval_secs: default_progress_interval(),
            monitoring: MonitoringSettings::default(),
            engine: EngineSettings::default(),
        }
    }
}

impl Settings {
    /// Parse settings from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    /// Check if a path should be excluded based on excluded_paths patterns.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();

        for pattern in &self.excluded_paths {
            if let Ok(glob) = globset::Glob::new(pattern) {
                if glob.compile_matcher().is_match(&*path_str) {
                    return true;
                }
            }
        }
        false
    }
}

/// Performance monitoring switch and destination.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MonitoringSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Directory receiving metrics.json (default: the user cache directory)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// How to reach or launch the bridge server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    /// URL of an already running engine; when set nothing is spawned
    #[serde(default)]
    pub url: Option<String>,
    /// Program used to run the bridge script (default: node)
    #[serde(default = "default_command")]
    pub command: String,
    /// Path to the bridge server script
    #[serde(default)]
    pub script: Option<PathBuf>,
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on; 0 picks a free port
    #[serde(default)]
    pub port: u16,
    /// Per-request timeout in milliseconds (default: 300000)
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// How long to wait for the engine to answer after spawning (default: 60000)
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            url: None,
            command: default_command(),
            script: None,
            host: default_host(),
            port: 0,
            timeout_ms: default_timeout(),
            startup_timeout_ms: default_startup_timeout(),
        }
    }
}

impl EngineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_progress_interval() -> u64 {
    10
}

fn default_command() -> String {
    "node".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_timeout() -> u64 {
    300_000
}

fn default_startup_timeout() -> u64 {
    60_000
}

/// Validate settings for correctness.
pub fn validate(settings: &Settings) -> anyhow::Result<()> {
    for pattern in &settings.excluded_paths {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e))?;
    }

    for rule in &settings.rules {
        if rule.key.trim().is_empty() {
            anyhow::bail!("rule with empty key");
        }
    }

    if settings.progress_interval_secs == 0 {
        anyhow::bail!("progress_interval_secs must be greater than 0");
    }

    if settings.engine.url.is_none() && settings.engine.script.is_none() {
        anyhow::bail!("engine needs either a url or a script to launch");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let yaml = r#"
language: typescript
rules:
  - key: no-unused-vars
  - key: max-depth
    configurations: [4]
environments: [node, browser]
tsconfig_paths:
  - tsconfig.json
monitoring:
  enabled: true
  path: /tmp/metrics
engine:
  script: bridge/server.js
  port: 4000
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.language, Language::TypeScript);
        assert_eq!(settings.rules.len(), 2);
        assert_eq!(settings.rules[1].configurations[0], serde_json::json!(4));
        assert_eq!(settings.environments, vec!["node", "browser"]);
        assert!(settings.monitoring.enabled);
        assert_eq!(settings.engine.port, 4000);
        assert_eq!(settings.engine.command, "node");
        assert!(settings.ignore_header_comments);
        assert_eq!(settings.progress_interval_secs, 10);
        validate(&settings).unwrap();
    }

    #[test]
    fn test_defaults_disable_monitoring() {
        let settings: Settings = serde_yaml::from_str("engine: { url: 'http://127.0.0.1:1' }").unwrap();
        assert!(!settings.monitoring.enabled);
        assert_eq!(settings.engine.timeout(), Duration::from_secs(300));
        assert_eq!(settings.language, Language::JavaScript);
    }

    #[test]
    fn test_validate_rejects_missing_engine() {
        let settings = Settings::default();
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_path_excluded() {
        let settings = Settings {
            excluded_paths: vec!["**/dist/**".to_string()],
            ..Default::default()
        };
        assert!(settings.is_path_excluded(Path::new("/p/dist/bundle.js")));
        assert!(!settings.is_path_excluded(Path::new("/p/src/index.js")));
    }
}

//! Project configuration graph resolution.
//!
//! Configuration files (tsconfig.json) reference each other through
//! `references`. The graph may contain cycles and diamonds; every reachable
//! file is loaded through the engine exactly once, in worklist order, and
//! input files are then assigned to the first configuration that claims
//! them.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

use crate::engine::protocol::LoadConfigResponse;
use crate::engine::{Engine, EngineError, Language};
use crate::input::InputFile;

/// File name assumed when a reference names a directory.
pub const DEFAULT_CONFIG_NAME: &str = "tsconfig.json";

/// A loaded configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Absolute, normalized path; the identity of the configuration.
    pub path: PathBuf,
    pub options: serde_json::Map<String, serde_json::Value>,
    /// Reference paths as written in the file.
    pub references: Vec<String>,
    /// Files listed explicitly.
    pub files: Vec<PathBuf>,
    /// Include globs relative to the configuration directory. `None` means
    /// the key was absent.
    pub include: Option<Vec<String>>,
    pub exclude: Vec<String>,
}

impl ConfigFile {
    /// A configuration with no options, references or match rules.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            options: serde_json::Map::new(),
            references: Vec::new(),
            files: Vec::new(),
            include: None,
            exclude: Vec::new(),
        }
    }

    pub(crate) fn from_response(path: &Path, response: LoadConfigResponse) -> Self {
        Self {
            path: normalize_path(path),
            options: response.options,
            references: response.project_references,
            files: response.files,
            include: response.include,
            exclude: response.exclude,
        }
    }

    /// Directory the configuration's relative paths are anchored to.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Include patterns in effect: an absent `include` with no explicit
    /// `files` claims everything below the directory.
    pub fn effective_include(&self) -> Vec<String> {
        match &self.include {
            Some(patterns) => patterns.clone(),
            None if self.files.is_empty() => vec!["**/*".to_string()],
            None => Vec::new(),
        }
    }

    /// References resolved to configuration file paths.
    pub fn resolved_references(&self) -> Vec<PathBuf> {
        self.references
            .iter()
            .map(|reference| resolve_reference(self.dir(), reference))
            .collect()
    }
}

impl std::fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Which configuration a group of files is analyzed with.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupConfig {
    Config(ConfigFile),
    /// Files no configuration claims.
    Unmatched,
}

/// Input files sharing one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigGroup {
    pub config: GroupConfig,
    pub files: Vec<InputFile>,
}

impl ConfigGroup {
    pub fn is_unmatched(&self) -> bool {
        matches!(self.config, GroupConfig::Unmatched)
    }

    pub fn config_file(&self) -> Option<&ConfigFile> {
        match &self.config {
            GroupConfig::Config(config) => Some(config),
            GroupConfig::Unmatched => None,
        }
    }
}

/// Configuration generated for projects that have none.
///
/// It lists the analyzed files explicitly and lives in a temporary
/// directory that is removed when the value is dropped.
#[derive(Debug)]
pub struct DefaultConfig {
    _dir: TempDir,
    path: PathBuf,
}

impl DefaultConfig {
    pub fn create(language: Language, files: &[InputFile]) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("lintbridge-").tempdir()?;
        let path = dir.path().join(DEFAULT_CONFIG_NAME);

        let mut compiler_options = serde_json::Map::new();
        if language == Language::JavaScript {
            compiler_options.insert("allowJs".to_string(), true.into());
            compiler_options.insert("noImplicitAny".to_string(), true.into());
        }
        let listed: Vec<String> = files
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect();
        let content = serde_json::json!({
            "compilerOptions": compiler_options,
            "files": listed,
        });
        fs::write(&path, serde_json::to_string_pretty(&content)?)?;

        log::debug!("Using generated tsconfig.json {}", path.display());
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Resolve a reference written in a configuration located in `base_dir`.
pub fn resolve_reference(base_dir: &Path, reference: &str) -> PathBuf {
    let joined = base_dir.join(reference);
    let is_json = joined
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        normalize_path(&joined)
    } else {
        normalize_path(&joined.join(DEFAULT_CONFIG_NAME))
    }
}

/// Lexically remove `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Loads the configuration graph through an engine.
pub struct ConfigGraphResolver<'a, E: Engine + ?Sized> {
    engine: &'a mut E,
}

impl<'a, E: Engine + ?Sized> ConfigGraphResolver<'a, E> {
    pub fn new(engine: &'a mut E) -> Self {
        Self { engine }
    }

    /// Load every configuration reachable from `seeds`, each exactly once.
    ///
    /// The result is in load order, which is breadth-first from the seeds.
    pub fn resolve(&mut self, seeds: &[PathBuf]) -> Result<Vec<ConfigFile>, EngineError> {
        let mut worklist: VecDeque<PathBuf> = seeds.iter().map(|p| normalize_path(p)).collect();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut configs = Vec::new();

        while let Some(path) = worklist.pop_front() {
            if !visited.insert(path.clone()) {
                continue;
            }
            let config = self.engine.load_config(&path)?;
            if !config.references.is_empty() {
                log::debug!(
                    "Adding referenced project's configs {:?}",
                    config.references
                );
            }
            worklist.extend(config.resolved_references());
            configs.push(config);
        }

        Ok(configs)
    }

    /// Resolve `seeds` and partition `files` over the loaded configurations.
    pub fn resolve_groups(
        &mut self,
        seeds: &[PathBuf],
        files: &[InputFile],
    ) -> Result<Vec<ConfigGroup>, EngineError> {
        if seeds.is_empty() {
            return Ok(Vec::new());
        }
        let configs = self.resolve(seeds)?;
        partition(configs, files)
    }
}

/// Compiled match rules of one configuration.
struct ConfigMatcher {
    dir: PathBuf,
    files: HashSet<PathBuf>,
    include: GlobSet,
    exclude: GlobSet,
}

impl ConfigMatcher {
    fn new(config: &ConfigFile) -> Result<Self, EngineError> {
        let dir = config.dir().to_path_buf();
        let files = config
            .files
            .iter()
            .map(|f| normalize_path(&dir.join(f)))
            .collect();
        Ok(Self {
            include: build_globset(config, &config.effective_include())?,
            exclude: build_globset(config, &config.exclude)?,
            dir,
            files,
        })
    }

    fn matches(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        if self.files.contains(&path) {
            return true;
        }
        match path.strip_prefix(&self.dir) {
            Ok(relative) => self.include.is_match(relative) && !self.exclude.is_match(relative),
            Err(_) => false,
        }
    }
}

/// Expand a tsconfig pattern into the globs it stands for.
///
/// A leading `./` is dropped, and a pattern without wildcards whose last
/// segment has no extension names a directory and also covers everything
/// below it.
fn expand_pattern(pattern: &str) -> Vec<String> {
    let pattern = match pattern.trim_start_matches("./").trim_end_matches('/') {
        "." => "",
        other => other,
    };
    let has_wildcard = pattern.contains(|c: char| matches!(c, '*' | '?' | '[' | '{'));
    let last_segment = pattern.rsplit('/').next().unwrap_or(pattern);
    if has_wildcard || last_segment.contains('.') {
        return vec![pattern.to_string()];
    }
    if pattern.is_empty() {
        return vec!["**/*".to_string()];
    }
    vec![pattern.to_string(), format!("{}/**/*", pattern)]
}

fn build_globset(config: &ConfigFile, patterns: &[String]) -> Result<GlobSet, EngineError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        for expanded in expand_pattern(pattern) {
            let glob = GlobBuilder::new(&expanded)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    EngineError::Protocol(format!(
                        "invalid pattern {:?} in {}: {}",
                        pattern, config, e
                    ))
                })?;
            builder.add(glob);
        }
    }
    builder
        .build()
        .map_err(|e| EngineError::Protocol(format!("invalid patterns in {}: {}", config, e)))
}

/// Assign each file to the first configuration matching it.
///
/// Groups keep configuration order and are only produced when non-empty;
/// files matching nothing end up in a trailing `Unmatched` group.
pub fn partition(
    configs: Vec<ConfigFile>,
    files: &[InputFile],
) -> Result<Vec<ConfigGroup>, EngineError> {
    let matchers = configs
        .iter()
        .map(ConfigMatcher::new)
        .collect::<Result<Vec<_>, _>>()?;

    let mut buckets: Vec<Vec<InputFile>> = vec![Vec::new(); configs.len()];
    let mut unmatched = Vec::new();

    for file in files {
        match matchers.iter().position(|m| m.matches(&file.path)) {
            Some(idx) => buckets[idx].push(file.clone()),
            None => unmatched.push(file.clone()),
        }
    }

    let mut groups: Vec<ConfigGroup> = configs
        .into_iter()
        .zip(buckets)
        .filter(|(_, files)| !files.is_empty())
        .map(|(config, files)| ConfigGroup {
            config: GroupConfig::Config(config),
            files,
        })
        .collect();

    if !unmatched.is_empty() {
        groups.push(ConfigGroup {
            config: GroupConfig::Unmatched,
            files: unmatched,
        });
    }

    Ok(groups)
}

//! Files handed to the engine.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::engine::{FileKind, Language};
use crate::settings::Settings;

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "bower_components", "dist", "coverage"];

/// A source file to analyze.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputFile {
    pub path: PathBuf,
    pub kind: FileKind,
    /// In-memory contents that differ from what is on disk (e.g. an unsaved
    /// editor buffer). Always sent to the engine when present.
    pub contents: Option<String>,
}

impl InputFile {
    pub fn new<P: Into<PathBuf>>(path: P, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            kind,
            contents: None,
        }
    }

    pub fn main<P: Into<PathBuf>>(path: P) -> Self {
        Self::new(path, FileKind::Main)
    }

    pub fn test<P: Into<PathBuf>>(path: P) -> Self {
        Self::new(path, FileKind::Test)
    }

    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    /// Contents to attach to the request, if any.
    ///
    /// In-memory contents win; otherwise the file is read from disk only when
    /// `send_file_content` is set.
    pub fn request_contents(&self, send_file_content: bool) -> std::io::Result<Option<String>> {
        if let Some(contents) = &self.contents {
            return Ok(Some(contents.clone()));
        }
        if !send_file_content {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

impl std::fmt::Display for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Guess whether a path is a test source from its name and location.
pub fn is_test_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.contains(".test.") || name.contains(".spec.") {
        return true;
    }
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("__tests__") | Some("__test__") | Some("__mocks__")
        )
    })
}

/// Collect the files of `language` below `root`, honoring excluded paths.
pub fn collect_files(
    root: &Path,
    language: Language,
    settings: &Settings,
) -> anyhow::Result<Vec<InputFile>> {
    let extensions = language.extensions();
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            if e.depth() > 0 && e.file_type().is_dir() && name.starts_with('.') {
                return false;
            }
            !(e.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref()))
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !extensions.contains(&ext) || settings.is_path_excluded(path) {
            continue;
        }
        // Declaration files carry no code to lint.
        if path.to_string_lossy().ends_with(".d.ts") {
            continue;
        }
        let kind = if is_test_file(path) {
            FileKind::Test
        } else {
            FileKind::Main
        };
        files.push(InputFile::new(path.to_path_buf(), kind));
    }

    Ok(files)
}

//! Language detection
//!
//! A deterministic counting heuristic over file extensions and marker files.
//! No syntax is parsed.

pub mod classifier;

use ignore::{Walk, WalkBuilder};
use std::path::Path;

pub use classifier::{Language, LanguageClassifier, LanguageCounts};

/// Infrastructure directories never descended into by any workspace walk
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".tracepack",
    "node_modules",
    "bower_components",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    "venv",
    ".venv",
    "env",
    ".env",
    "site-packages",
    "target",
    "build",
    "dist",
    "out",
    ".gradle",
    ".mvn",
    ".idea",
    ".vscode",
    "coverage",
    "vendor",
];

/// Returns true when a directory name belongs to the excluded set
pub fn is_excluded_dir(name: &str) -> bool {
    EXCLUDED_DIRS.contains(&name)
}

/// Walks every file under `root`, ignore files included, skipping excluded
/// directories. Symlinks are not followed.
pub(crate) fn workspace_walker(root: &Path) -> Walk {
    let root_path = root.to_path_buf();
    WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            if entry.path() == root_path {
                return true;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            !(is_dir && is_excluded_dir(&entry.file_name().to_string_lossy()))
        })
        .build()
}

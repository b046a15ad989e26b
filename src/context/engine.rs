use super::budget::{BudgetTracker, ContextBudget};
use super::key_files::{key_files_for, README_NAMES};
use crate::detection::{is_excluded_dir, workspace_walker, Language};
use crate::error::PipelineError;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Returned instead of an empty digest when no file content could be read
pub const NO_CONTENT_SENTINEL: &str = "(no readable content found in workspace)";

const STRUCTURE_HEADER: &str = "Project structure:\n";
const LISTING_TRUNCATED: &str = "... (listing truncated)";
const FILE_TRUNCATED: &str = "... (truncated)\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentKind {
    Structure,
    File { path: String },
    Sentinel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestSegment {
    #[serde(flatten)]
    pub kind: SegmentKind,
    pub text: String,
}

/// Bounded, ordered summary of a workspace
///
/// `chars_used` always equals the character count of [`ContextDigest::render`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextDigest {
    pub segments: Vec<DigestSegment>,
    pub chars_used: usize,
    pub bytes_read: u64,
    pub files_read: usize,
}

impl ContextDigest {
    pub fn no_content() -> Self {
        Self::no_content_within(usize::MAX)
    }

    /// The sentinel, cut short when the character budget cannot hold it
    fn no_content_within(max_chars: usize) -> Self {
        let text: String = NO_CONTENT_SENTINEL.chars().take(max_chars).collect();
        Self {
            chars_used: text.chars().count(),
            segments: vec![DigestSegment {
                kind: SegmentKind::Sentinel,
                text,
            }],
            bytes_read: 0,
            files_read: 0,
        }
    }

    pub fn has_content(&self) -> bool {
        self.files_read > 0
    }

    pub fn render(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// Workspace-relative paths of every file that contributed content
    pub fn files(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match &s.kind {
                SegmentKind::File { path } => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ContextBudgetEngine {
    budget: ContextBudget,
}

impl ContextBudgetEngine {
    pub fn new(budget: ContextBudget) -> Self {
        Self { budget }
    }

    /// Builds a fresh digest. Only a missing or non-directory workspace is an
    /// error; unreadable files are skipped.
    pub fn build(
        &self,
        workspace: &Path,
        language: Language,
    ) -> Result<ContextDigest, PipelineError> {
        if !workspace.is_dir() {
            return Err(PipelineError::workspace(workspace, "not a directory"));
        }

        let mut run = DigestRun {
            root: workspace,
            budget: &self.budget,
            tracker: BudgetTracker::new(self.budget),
            segments: Vec::new(),
            seen: HashSet::new(),
        };

        let cap = self.budget.structure_chars().min(run.tracker.remaining_chars());
        if let Some(listing) = clip_listing(&self.structure_listing(workspace), cap) {
            run.tracker.record_text(listing.chars().count());
            run.segments.push(DigestSegment {
                kind: SegmentKind::Structure,
                text: listing,
            });
        }

        if let Some(readme) = find_readme(workspace) {
            run.consume(&readme, true);
        }

        for candidate in key_files_for(language) {
            if run.tracker.exhausted() {
                break;
            }
            let path = workspace.join(candidate);
            if path.is_file() {
                run.consume(&path, false);
            }
        }

        if !run.tracker.exhausted() {
            for path in fallback_candidates(workspace, language) {
                if run.tracker.exhausted() {
                    break;
                }
                run.consume(&path, false);
            }
        }

        if run.tracker.files_read() == 0 {
            debug!(workspace = %workspace.display(), "No readable content for digest");
            return Ok(ContextDigest::no_content_within(self.budget.max_chars));
        }

        debug!(
            workspace = %workspace.display(),
            files_read = run.tracker.files_read(),
            chars_used = run.tracker.chars_used(),
            "Built context digest"
        );

        Ok(ContextDigest {
            chars_used: run.tracker.chars_used(),
            bytes_read: run.tracker.bytes_read(),
            files_read: run.tracker.files_read(),
            segments: run.segments,
        })
    }

    fn structure_listing(&self, root: &Path) -> String {
        let mut listing = Listing {
            budget: &self.budget,
            lines: Vec::new(),
            truncated: false,
        };
        listing.walk(root, 0);

        let mut out = String::from(STRUCTURE_HEADER);
        for line in &listing.lines {
            out.push_str(line);
            out.push('\n');
        }
        if listing.truncated {
            out.push_str(LISTING_TRUNCATED);
            out.push('\n');
        }
        out
    }
}

struct Listing<'a> {
    budget: &'a ContextBudget,
    lines: Vec<String>,
    truncated: bool,
}

impl Listing<'_> {
    fn push(&mut self, line: String) -> bool {
        if self.lines.len() >= self.budget.max_tree_lines {
            self.truncated = true;
            return false;
        }
        self.lines.push(line);
        true
    }

    fn walk(&mut self, dir: &Path, depth: usize) {
        if self.truncated {
            return;
        }

        let mut entries: Vec<(String, PathBuf, bool)> = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir
                .filter_map(|e| e.ok())
                .map(|e| {
                    let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    (e.file_name().to_string_lossy().into_owned(), e.path(), is_dir)
                })
                .filter(|(name, _, is_dir)| !(*is_dir && is_excluded_dir(name)))
                .collect(),
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Cannot list directory");
                return;
            }
        };
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let indent = "  ".repeat(depth);
        let total = entries.len();
        for (shown, (name, path, is_dir)) in entries.into_iter().enumerate() {
            if shown >= self.budget.max_dir_entries {
                self.push(format!("{}... ({} more entries)", indent, total - shown));
                return;
            }

            let line = if is_dir {
                format!("{}{}/", indent, name)
            } else {
                format!("{}{}", indent, name)
            };
            if !self.push(line) {
                return;
            }

            if is_dir && depth + 1 < self.budget.max_depth {
                self.walk(&path, depth + 1);
                if self.truncated {
                    return;
                }
            }
        }
    }
}

/// Fits a listing into `cap` characters, cutting at a line boundary and
/// marking the cut. Returns `None` when not even the header fits.
fn clip_listing(listing: &str, cap: usize) -> Option<String> {
    if listing.chars().count() <= cap {
        return Some(listing.to_string());
    }

    let marker_chars = LISTING_TRUNCATED.chars().count() + 1;
    if cap < STRUCTURE_HEADER.chars().count() + marker_chars {
        return None;
    }

    let limit = cap - marker_chars;
    let mut out = String::new();
    let mut used = 0;
    for line in listing.split_inclusive('\n') {
        let len = line.chars().count();
        if used + len > limit || line.starts_with(LISTING_TRUNCATED) {
            break;
        }
        out.push_str(line);
        used += len;
    }
    out.push_str(LISTING_TRUNCATED);
    out.push('\n');
    Some(out)
}

struct DigestRun<'a> {
    root: &'a Path,
    budget: &'a ContextBudget,
    tracker: BudgetTracker,
    segments: Vec<DigestSegment>,
    seen: HashSet<PathBuf>,
}

impl DigestRun<'_> {
    /// Attempts to add one file; every path is attempted at most once
    fn consume(&mut self, path: &Path, truncate_oversized: bool) {
        if self.tracker.files_exhausted() || !self.seen.insert(path.to_path_buf()) {
            return;
        }

        let rel = display_path(self.root, path);
        let metadata = match fs::symlink_metadata(path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return,
            Err(e) => {
                warn!(path = %rel, error = %e, "Skipping unreadable file");
                return;
            }
        };

        let size = metadata.len();
        let truncated = size > self.budget.max_file_bytes;
        if truncated && !truncate_oversized {
            debug!(path = %rel, size, "Skipping file over per-file byte budget");
            return;
        }

        let bytes = match read_prefix(path, self.budget.max_file_bytes) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %rel, error = %e, "Skipping unreadable file");
                return;
            }
        };

        let Some(content) = decode_text(&bytes, truncated) else {
            warn!(path = %rel, "Skipping non-text file");
            return;
        };

        let mut text = format!("--- {} ---\n{}", rel, content);
        if !text.ends_with('\n') {
            text.push('\n');
        }
        if truncated {
            text.push_str(FILE_TRUNCATED);
        }

        let chars = text.chars().count();
        if !self.tracker.fits_chars(chars) {
            debug!(path = %rel, chars, "Skipping file over remaining character budget");
            return;
        }

        self.tracker.record_file(chars, bytes.len() as u64);
        self.segments.push(DigestSegment {
            kind: SegmentKind::File { path: rel },
            text,
        });
    }
}

fn read_prefix(path: &Path, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)?.take(limit).read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// UTF-8 text without NUL bytes; a truncated read may end mid-character
fn decode_text(bytes: &[u8], truncated: bool) -> Option<String> {
    if bytes.contains(&0) {
        return None;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.to_string()),
        Err(e) if truncated && e.error_len().is_none() => {
            std::str::from_utf8(&bytes[..e.valid_up_to()])
                .ok()
                .map(str::to_string)
        }
        Err(_) => None,
    }
}

fn find_readme(root: &Path) -> Option<PathBuf> {
    README_NAMES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// Source files for the language, shallow and short names first
fn fallback_candidates(root: &Path, language: Language) -> Vec<PathBuf> {
    let extensions = language.source_extensions();
    let mut candidates: Vec<(usize, usize, String, PathBuf)> = workspace_walker(root)
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            (entry.depth(), name.chars().count(), name, entry.into_path())
        })
        .collect();

    candidates.sort();
    candidates.into_iter().map(|(_, _, _, path)| path).collect()
}

fn display_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_FILES: usize = 8;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 16 * 1024;
pub const DEFAULT_MAX_CHARS: usize = 24_000;
pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_MAX_TREE_LINES: usize = 150;
pub const DEFAULT_MAX_DIR_ENTRIES: usize = 30;

/// Smallest character budget configuration accepts. The engine itself honours
/// any budget, cutting the no-content sentinel short when it does not fit.
pub const MIN_MAX_CHARS: usize = 256;

/// Hard ceilings applied while building a [`super::ContextDigest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    /// Distinct files whose content may appear in the digest
    pub max_files: usize,
    /// Files larger than this are skipped. A README is the one exception: it
    /// is read up to this many bytes and marked as truncated.
    pub max_file_bytes: u64,
    /// Total characters across every emitted segment
    pub max_chars: usize,
    /// Deepest directory level shown in the structure listing
    pub max_depth: usize,
    /// Lines emitted by the structure listing before it is cut off
    pub max_tree_lines: usize,
    /// Entries shown per directory before the rest are summarised
    pub max_dir_entries: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_chars: DEFAULT_MAX_CHARS,
            max_depth: DEFAULT_MAX_DEPTH,
            max_tree_lines: DEFAULT_MAX_TREE_LINES,
            max_dir_entries: DEFAULT_MAX_DIR_ENTRIES,
        }
    }
}

impl ContextBudget {
    /// Characters the structure listing may occupy; the rest is reserved for
    /// file content
    pub fn structure_chars(&self) -> usize {
        self.max_chars / 2
    }
}

/// Running totals checked before every segment is admitted
#[derive(Debug, Clone)]
pub(crate) struct BudgetTracker {
    budget: ContextBudget,
    chars_used: usize,
    bytes_read: u64,
    files_read: usize,
}

impl BudgetTracker {
    pub(crate) fn new(budget: ContextBudget) -> Self {
        Self {
            budget,
            chars_used: 0,
            bytes_read: 0,
            files_read: 0,
        }
    }

    pub(crate) fn remaining_chars(&self) -> usize {
        self.budget.max_chars.saturating_sub(self.chars_used)
    }

    pub(crate) fn files_exhausted(&self) -> bool {
        self.files_read >= self.budget.max_files
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.files_exhausted() || self.remaining_chars() == 0
    }

    pub(crate) fn fits_chars(&self, chars: usize) -> bool {
        chars <= self.remaining_chars()
    }

    pub(crate) fn record_text(&mut self, chars: usize) {
        self.chars_used += chars;
    }

    pub(crate) fn record_file(&mut self, chars: usize, bytes: u64) {
        self.chars_used += chars;
        self.bytes_read += bytes;
        self.files_read += 1;
    }

    pub(crate) fn chars_used(&self) -> usize {
        self.chars_used
    }

    pub(crate) fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub(crate) fn files_read(&self) -> usize {
        self.files_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_and_exhaustion() {
        let budget = ContextBudget {
            max_files: 2,
            max_chars: 300,
            ..Default::default()
        };
        let mut tracker = BudgetTracker::new(budget);

        tracker.record_text(100);
        assert_eq!(tracker.remaining_chars(), 200);
        assert!(tracker.fits_chars(200));
        assert!(!tracker.fits_chars(201));

        tracker.record_file(50, 60);
        tracker.record_file(10, 12);
        assert!(tracker.files_exhausted());
        assert!(tracker.exhausted());
        assert_eq!(tracker.bytes_read(), 72);
        assert_eq!(tracker.files_read(), 2);
        assert_eq!(tracker.chars_used(), 160);
    }

    #[test]
    fn test_structure_share_is_half() {
        let budget = ContextBudget::default();
        assert_eq!(budget.structure_chars(), DEFAULT_MAX_CHARS / 2);
    }
}

//! Context budget engine
//!
//! Produces a bounded, deterministic digest of a workspace: a structure
//! listing followed by prioritized file contents. Three budgets apply at
//! once (files read, bytes per file, total characters) and the digest is
//! rebuilt on every request.

pub mod budget;
pub mod engine;
pub mod key_files;

pub use budget::ContextBudget;
pub use engine::{ContextBudgetEngine, ContextDigest, DigestSegment, SegmentKind, NO_CONTENT_SENTINEL};

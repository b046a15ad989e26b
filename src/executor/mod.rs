//! Stage executors
//!
//! Every external tool (instrumentation script, container build, compose,
//! git) is reached through [`ProcessRunner`], which turns one invocation into
//! a [`StageOutcome`]: success, process failure, or timeout.

pub mod runner;
pub mod stages;

pub use runner::{ProcessRunner, ProcessSpec, StageOutcome, TokioProcessRunner, MAX_CAPTURED_BYTES};
pub use stages::{ExecutorSettings, StageExecutors, StageProfile, SETUP_SCRIPT};

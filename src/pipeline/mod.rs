//! Per-application pipeline
//!
//! [`PipelineController`] owns the state machine. Records are persisted by
//! [`StateStore`] and stage operations on one identifier are serialized by
//! [`AppLocks`].

mod application;
mod controller;
mod locks;
mod state;

pub use application::{Application, FailureRecord, LifecycleState};
pub use controller::PipelineController;
pub use locks::AppLocks;
pub use state::StateStore;

//! tracepack - OpenTelemetry instrumentation and containerization pipeline
//!
//! Takes an application from an archive, a git repository or a local
//! directory and walks it through a fixed sequence of stages: language
//! detection, auto-instrumentation, container descriptor generation and
//! orchestration onto a shared telemetry network. A bounded digest of the
//! workspace can be sent to a completion service for observability advice.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracepack::{PipelineController, SourceSpec, TokioProcessRunner, TracepackConfig};
//!
//! # async fn demo() -> Result<(), tracepack::PipelineError> {
//! let config = TracepackConfig::default();
//! let controller = PipelineController::new(&config, Arc::new(TokioProcessRunner::new()), None)?;
//!
//! let app = controller
//!     .ingest(SourceSpec::Directory { path: "./my-service".into() })
//!     .await?;
//! let app = controller.deploy(&app.id).await?;
//! println!("{} is {}", app.id, app.state);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`pipeline`]: lifecycle state machine, persistence and per-application locking
//! - [`detection`]: extension-counting language classifier
//! - [`context`]: budget-bounded workspace digests
//! - [`executor`]: external process execution with timeouts
//! - [`source`]: archive extraction, directory copy and git cloning
//! - [`container`]: Dockerfile and compose generation
//! - [`advisory`] and [`llm`]: completion service access

pub mod advisory;
pub mod cli;
pub mod config;
pub mod container;
pub mod context;
pub mod detection;
pub mod error;
pub mod executor;
pub mod llm;
pub mod pipeline;
pub mod source;
pub mod util;
pub mod workspace;

pub use advisory::{Advice, AdvisoryClient, AdvisoryError};
pub use config::{AdvisoryProvider, ConfigError, TracepackConfig};
pub use container::ContainerArtifacts;
pub use context::{ContextBudget, ContextBudgetEngine, ContextDigest};
pub use detection::{Language, LanguageClassifier};
pub use error::{ErrorKind, PipelineError, SourceFailure, Stage};
pub use executor::{ProcessRunner, ProcessSpec, StageOutcome, TokioProcessRunner};
pub use llm::{BackendError, LLMClient};
pub use pipeline::{Application, LifecycleState, PipelineController};
pub use source::SourceSpec;
pub use util::{init_logging, LoggingConfig};
pub use workspace::{AppId, WorkspaceStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

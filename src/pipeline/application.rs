use crate::container::ContainerArtifacts;
use crate::detection::Language;
use crate::error::{ErrorKind, PipelineError, Stage};
use crate::workspace::AppId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Ingested,
    LanguageDetected,
    Instrumented,
    Containerized,
    Running,
    Failed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Ingested => "ingested",
            LifecycleState::LanguageDetected => "language_detected",
            LifecycleState::Instrumented => "instrumented",
            LifecycleState::Containerized => "containerized",
            LifecycleState::Running => "running",
            LifecycleState::Failed => "failed",
        }
    }

    /// Position along the stage sequence; `Failed` sits outside it
    fn rank(&self) -> Option<u8> {
        match self {
            LifecycleState::Ingested => Some(0),
            LifecycleState::LanguageDetected => Some(1),
            LifecycleState::Instrumented => Some(2),
            LifecycleState::Containerized => Some(3),
            LifecycleState::Running => Some(4),
            LifecycleState::Failed => None,
        }
    }

    /// Latest state a failure in `stage` may leave resumable: the state the
    /// stage itself starts from, so a failed stage never unlocks later ones
    fn resume_point(stage: Stage) -> LifecycleState {
        match stage {
            Stage::Ingest | Stage::DetectLanguage => LifecycleState::Ingested,
            Stage::Instrument => LifecycleState::LanguageDetected,
            Stage::Containerize => LifecycleState::Instrumented,
            Stage::Run => LifecycleState::Containerized,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit entry written when a stage fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    /// State the application had reached before the failing stage started
    pub last_successful: LifecycleState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: AppId,
    pub workspace: PathBuf,
    pub state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ContainerArtifacts>,
    /// Credential-free description of where the source came from
    pub source: String,
    /// Branch actually checked out, for git sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
}

impl Application {
    pub fn ingested(id: AppId, workspace: PathBuf, source: String, branch: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            workspace,
            state: LifecycleState::Ingested,
            language: None,
            artifacts: None,
            source,
            branch,
            created_at: now,
            updated_at: now,
            failure: None,
        }
    }

    /// The state preconditions are checked against: the state itself, or the
    /// last successful one when the application has failed
    pub fn effective_state(&self) -> LifecycleState {
        match (&self.state, &self.failure) {
            (LifecycleState::Failed, Some(failure)) => failure.last_successful,
            (LifecycleState::Failed, None) => LifecycleState::Ingested,
            (state, _) => *state,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state == LifecycleState::Failed
    }

    /// Moves forward to `target`, never backward, and clears any failure
    pub fn advance(&mut self, target: LifecycleState) {
        let current = self.effective_state();
        self.state = match (current.rank(), target.rank()) {
            (Some(from), Some(to)) if to < from => current,
            _ => target,
        };
        self.failure = None;
        self.updated_at = Utc::now();
    }

    /// Records `error` against `stage` and enters `Failed`. Artifacts written
    /// by earlier stages stay in place.
    ///
    /// The recorded last successful state never lies past the failing stage's
    /// entry point, so re-running a completed stage and failing rolls the
    /// application back to that stage.
    pub fn fail(&mut self, stage: Stage, error: &PipelineError) {
        let now = Utc::now();
        let reached = self.effective_state();
        let ceiling = LifecycleState::resume_point(stage);
        let last_successful = match (reached.rank(), ceiling.rank()) {
            (Some(r), Some(c)) if r > c => ceiling,
            _ => reached,
        };
        self.failure = Some(FailureRecord {
            stage,
            kind: error.kind(),
            message: error.to_string(),
            diagnostics: error.diagnostics(),
            last_successful,
            at: now,
        });
        self.state = LifecycleState::Failed;
        self.updated_at = now;
    }
}

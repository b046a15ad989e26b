use super::application::{Application, LifecycleState};
use super::locks::AppLocks;
use super::state::StateStore;
use crate::advisory::{Advice, AdvisoryClient, AdvisorySettings};
use crate::config::{TracepackConfig, STATE_DIR_NAME};
use crate::container::{self, ComposeSettings, ContainerArtifacts};
use crate::context::{ContextBudgetEngine, ContextDigest};
use crate::detection::{Language, LanguageClassifier};
use crate::error::{PipelineError, Stage};
use crate::executor::{ExecutorSettings, ProcessRunner, StageExecutors};
use crate::llm::LLMClient;
use crate::source::{copy_dir, extract_archive, GitCloner, SourceSpec};
use crate::workspace::{AppId, WorkspaceStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Drives applications through ingest, detection, instrumentation,
/// containerization and run. Every stage operation holds the application's
/// lock from precondition check to persisted result.
pub struct PipelineController {
    workspaces: WorkspaceStore,
    states: StateStore,
    locks: AppLocks,
    executors: StageExecutors,
    cloner: GitCloner,
    classifier: LanguageClassifier,
    context: ContextBudgetEngine,
    advisory: AdvisoryClient,
    compose: ComposeSettings,
}

/// Runs filesystem-heavy work off the async workers
async fn blocking<T, F>(path: &Path, work: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PipelineError::workspace(path, format!("background task failed: {}", e)))?
}

fn describe_state(app: &Application) -> String {
    if app.is_failed() {
        format!("failed (last successful: {})", app.effective_state())
    } else {
        app.state.to_string()
    }
}

fn require(
    app: &Application,
    operation: &'static str,
    allowed: &[LifecycleState],
) -> Result<(), PipelineError> {
    if allowed.contains(&app.effective_state()) {
        Ok(())
    } else {
        Err(PipelineError::InvalidState {
            id: app.id.to_string(),
            operation,
            state: describe_state(app),
        })
    }
}

impl PipelineController {
    /// Wires the controller from configuration. The process runner and the
    /// completion client are injected so tests can replace both.
    pub fn new(
        config: &TracepackConfig,
        runner: Arc<dyn ProcessRunner>,
        llm: Option<Arc<dyn LLMClient>>,
    ) -> Result<Self, PipelineError> {
        let workspaces = WorkspaceStore::new(&config.base_dir)?;
        let states = StateStore::new(workspaces.base().join(STATE_DIR_NAME))?;

        Ok(Self {
            states,
            locks: AppLocks::new(),
            executors: StageExecutors::new(runner.clone(), ExecutorSettings::from_config(config)),
            cloner: GitCloner::new(runner, config.git_bin.clone(), config.clone_timeout()),
            classifier: LanguageClassifier::new(),
            context: ContextBudgetEngine::new(config.context),
            advisory: AdvisoryClient::new(llm, AdvisorySettings::from_config(config)),
            compose: ComposeSettings {
                network: config.telemetry_network.clone(),
                otlp_endpoint: config.otlp_endpoint.clone(),
            },
            workspaces,
        })
    }

    pub fn workspaces(&self) -> &WorkspaceStore {
        &self.workspaces
    }

    /// Creates a workspace and fills it from `source`. A failed population
    /// removes the workspace again and persists nothing.
    pub async fn ingest(&self, source: SourceSpec) -> Result<Application, PipelineError> {
        let id = self.workspaces.create()?;
        let _guard = self.locks.acquire(&id).await;
        let workspace = self.workspaces.path_for(&id)?;
        let start = Instant::now();

        info!(app_id = %id, source = %source, "Ingesting application");

        let result = match self.populate(&source, &workspace).await {
            Ok(branch) => {
                let app = Application::ingested(id, workspace, source.describe(), branch);
                self.states.save(&app).map(|_| app)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(app) => {
                info!(
                    app_id = %id,
                    branch = app.branch.as_deref().unwrap_or("-"),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Application ingested"
                );
                Ok(app)
            }
            Err(e) => {
                warn!(app_id = %id, error = %e, "Ingestion failed, discarding workspace");
                if let Err(cleanup) = self.workspaces.destroy(&id) {
                    error!(app_id = %id, error = %cleanup, "Could not remove partial workspace");
                }
                self.locks.forget(&id);
                Err(e)
            }
        }
    }

    /// Returns the branch actually checked out for git sources
    async fn populate(
        &self,
        source: &SourceSpec,
        workspace: &Path,
    ) -> Result<Option<String>, PipelineError> {
        match source {
            SourceSpec::Archive { path } => {
                let (archive, dest) = (path.clone(), workspace.to_path_buf());
                blocking(workspace, move || extract_archive(&archive, &dest)).await?;
                Ok(None)
            }
            SourceSpec::Directory { path } => {
                let (src, dest) = (path.clone(), workspace.to_path_buf());
                blocking(workspace, move || copy_dir(&src, &dest)).await?;
                Ok(None)
            }
            SourceSpec::Git { url, branch } => self
                .cloner
                .clone_into(url, branch.as_deref(), workspace)
                .await
                .map(Some),
        }
    }

    /// Records a stage failure; the error is returned unchanged
    fn fail(&self, app: &mut Application, stage: Stage, err: PipelineError) -> PipelineError {
        app.fail(stage, &err);
        warn!(
            app_id = %app.id,
            stage = %stage,
            kind = %err.kind(),
            error = %err,
            "Stage failed"
        );
        if let Err(save_err) = self.states.save(app) {
            error!(app_id = %app.id, error = %save_err, "Could not persist failure record");
        }
        err
    }

    fn workspace_of(&self, app: &Application) -> Result<PathBuf, PipelineError> {
        self.workspaces.path_for(&app.id)
    }

    /// Classifies the workspace. `force` re-runs detection on an application
    /// whose language is already known.
    pub async fn detect_language(&self, id: &AppId, force: bool) -> Result<Application, PipelineError> {
        let _guard = self.locks.acquire(id).await;
        let mut app = self.states.load(id)?;

        let allowed: &[LifecycleState] = if force {
            &[LifecycleState::Ingested, LifecycleState::LanguageDetected]
        } else {
            &[LifecycleState::Ingested]
        };
        require(&app, "detect_language", allowed)?;

        let workspace = match self.workspace_of(&app) {
            Ok(path) => path,
            Err(e) => return Err(self.fail(&mut app, Stage::DetectLanguage, e)),
        };

        let classifier = self.classifier;
        let dir = workspace.clone();
        let language = match blocking(&workspace, move || classifier.classify(&dir)).await {
            Ok(language) => language,
            Err(e) => return Err(self.fail(&mut app, Stage::DetectLanguage, e)),
        };

        if !language.is_supported() {
            app.language = Some(Language::Unknown);
            let err = PipelineError::UnsupportedLanguage { id: id.to_string() };
            return Err(self.fail(&mut app, Stage::DetectLanguage, err));
        }

        app.language = Some(language);
        app.advance(LifecycleState::LanguageDetected);
        self.states.save(&app)?;
        info!(app_id = %id, language = %language, "Language detected");
        Ok(app)
    }

    /// Runs the language's instrumentation script, then writes and validates
    /// the container descriptors. Ends in `Containerized` on success.
    pub async fn instrument(&self, id: &AppId) -> Result<Application, PipelineError> {
        let _guard = self.locks.acquire(id).await;
        let mut app = self.states.load(id)?;

        require(
            &app,
            "instrument",
            &[
                LifecycleState::LanguageDetected,
                LifecycleState::Instrumented,
                LifecycleState::Containerized,
            ],
        )?;
        let language = match app.language {
            Some(language) if language.is_supported() => language,
            _ => return Err(PipelineError::UnsupportedLanguage { id: id.to_string() }),
        };

        let workspace = match self.workspace_of(&app) {
            Ok(path) => path,
            Err(e) => return Err(self.fail(&mut app, Stage::Instrument, e)),
        };

        if let Err(e) = self.executors.instrument(language, &workspace).await {
            return Err(self.fail(&mut app, Stage::Instrument, e));
        }
        app.advance(LifecycleState::Instrumented);
        self.states.save(&app)?;
        info!(app_id = %id, language = %language, "Instrumentation applied");

        let artifacts = match self.containerize(&app, language, &workspace).await {
            Ok(artifacts) => artifacts,
            Err(e) => return Err(self.fail(&mut app, Stage::Containerize, e)),
        };

        app.artifacts = Some(artifacts);
        app.advance(LifecycleState::Containerized);
        self.states.save(&app)?;
        info!(app_id = %id, service = %app.id.service_name(), "Application containerized");
        Ok(app)
    }

    async fn containerize(
        &self,
        app: &Application,
        language: Language,
        workspace: &Path,
    ) -> Result<ContainerArtifacts, PipelineError> {
        let service_name = app.id.service_name();
        let settings = self.compose.clone();
        let dir = workspace.to_path_buf();
        let artifacts = blocking(workspace, move || {
            container::generate(&dir, language, &service_name, &settings)
        })
        .await?;

        self.executors.build_image(workspace, &artifacts).await?;
        Ok(artifacts)
    }

    /// Starts the composed service
    pub async fn run(&self, id: &AppId) -> Result<Application, PipelineError> {
        let _guard = self.locks.acquire(id).await;
        let mut app = self.states.load(id)?;

        require(&app, "run", &[LifecycleState::Containerized])?;
        let compose_file = app
            .artifacts
            .as_ref()
            .map(|a| a.compose_file.clone())
            .ok_or_else(|| PipelineError::NotFound(format!("container artifacts for {}", id)))?;

        let workspace = match self.workspace_of(&app) {
            Ok(path) => path,
            Err(e) => return Err(self.fail(&mut app, Stage::Run, e)),
        };
        if !compose_file.is_file() {
            let err = PipelineError::NotFound(format!("compose file {}", compose_file.display()));
            return Err(self.fail(&mut app, Stage::Run, err));
        }

        if let Err(e) = self.executors.compose_up(&workspace, &compose_file).await {
            return Err(self.fail(&mut app, Stage::Run, e));
        }

        app.advance(LifecycleState::Running);
        self.states.save(&app)?;
        info!(app_id = %id, service = %id.service_name(), "Application running");
        Ok(app)
    }

    /// Detect, instrument and run, skipping stages already completed. Each
    /// stage takes the lock on its own.
    pub async fn deploy(&self, id: &AppId) -> Result<Application, PipelineError> {
        if self.status(id)?.effective_state() == LifecycleState::Ingested {
            self.detect_language(id, false).await?;
        }
        if matches!(
            self.status(id)?.effective_state(),
            LifecycleState::LanguageDetected | LifecycleState::Instrumented
        ) {
            self.instrument(id).await?;
        }
        self.run(id).await
    }

    pub fn status(&self, id: &AppId) -> Result<Application, PipelineError> {
        self.states.load(id)
    }

    pub fn list(&self) -> Result<Vec<Application>, PipelineError> {
        self.states.list()
    }

    /// Deletes the workspace and the persisted record. Waits for any
    /// in-flight stage on the same application.
    pub async fn remove(&self, id: &AppId) -> Result<(), PipelineError> {
        let _guard = self.locks.acquire(id).await;
        let known = self.states.load(id).is_ok() || self.workspaces.exists(id);
        if !known {
            return Err(PipelineError::NotFound(format!("application {}", id)));
        }

        self.workspaces.destroy(id)?;
        self.states.delete(id)?;
        self.locks.forget(id);
        info!(app_id = %id, "Application removed");
        Ok(())
    }

    /// Builds a fresh digest of the application's workspace
    pub async fn digest(&self, id: &AppId) -> Result<ContextDigest, PipelineError> {
        let _guard = self.locks.acquire(id).await;
        let app = self.states.load(id)?;
        let workspace = self.workspace_of(&app)?;
        let language = app.language.unwrap_or(Language::Unknown);

        let engine = self.context.clone();
        let dir = workspace.clone();
        blocking(&workspace, move || engine.build(&dir, language)).await
    }

    /// Digest plus one advisory call. The lock covers only the digest.
    pub async fn suggest(&self, id: &AppId) -> Result<Advice, PipelineError> {
        let digest = self.digest(id).await?;
        let language = self.status(id)?.language.unwrap_or(Language::Unknown);
        Ok(self.advisory.advise(&digest, language).await?)
    }
}

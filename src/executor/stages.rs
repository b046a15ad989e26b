use super::runner::{ProcessRunner, ProcessSpec};
use crate::config::TracepackConfig;
use crate::container::ContainerArtifacts;
use crate::detection::Language;
use crate::error::{PipelineError, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Name of the per-language setup script under the instrumentation root
pub const SETUP_SCRIPT: &str = "setup.sh";

/// Versioned container tooling behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageProfile {
    /// Standalone `docker-compose` binary; the image is built by `up`
    V1,
    /// `docker build` during containerization, then the `docker compose` plugin
    #[default]
    V2,
}

impl fmt::Display for StageProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageProfile::V1 => write!(f, "v1"),
            StageProfile::V2 => write!(f, "v2"),
        }
    }
}

impl FromStr for StageProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "v1" | "1" | "legacy" => Ok(StageProfile::V1),
            "v2" | "2" => Ok(StageProfile::V2),
            other => Err(format!("Unknown stage profile: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub instrumentation_dir: PathBuf,
    pub script_interpreter: String,
    pub container_cli: String,
    pub compose_bin: String,
    pub profile: StageProfile,
    pub instrument_timeout: Duration,
    pub build_timeout: Duration,
    pub run_timeout: Duration,
}

impl ExecutorSettings {
    pub fn from_config(config: &TracepackConfig) -> Self {
        Self {
            instrumentation_dir: config.instrumentation_dir.clone(),
            script_interpreter: config.script_interpreter.clone(),
            container_cli: config.container_cli.clone(),
            compose_bin: config.compose_bin.clone(),
            profile: config.stage_profile,
            instrument_timeout: config.instrument_timeout(),
            build_timeout: config.build_timeout(),
            run_timeout: config.run_timeout(),
        }
    }
}

/// The instrument, containerize and run invocations, each bounded by its own
/// timeout. Nothing here retries.
pub struct StageExecutors {
    runner: Arc<dyn ProcessRunner>,
    settings: ExecutorSettings,
}

impl StageExecutors {
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: ExecutorSettings) -> Self {
        Self { runner, settings }
    }

    /// Resolves `<instrumentation_dir>/<lang>/setup.sh`
    pub fn script_for(&self, language: Language) -> Result<PathBuf, PipelineError> {
        let dir = language
            .instrumentation_dir()
            .ok_or_else(|| PipelineError::NotFound(format!("instrumentation for {}", language)))?;
        let script = self.settings.instrumentation_dir.join(dir).join(SETUP_SCRIPT);
        std::fs::canonicalize(&script).map_err(|_| {
            PipelineError::NotFound(format!("instrumentation script {}", script.display()))
        })
    }

    pub async fn instrument(&self, language: Language, workspace: &Path) -> Result<(), PipelineError> {
        let script = self.script_for(language)?;
        let spec = ProcessSpec::new(
            Stage::Instrument,
            &self.settings.script_interpreter,
            self.settings.instrument_timeout,
        )
        .arg(script.to_string_lossy())
        .arg(workspace.to_string_lossy())
        .env("TRACEPACK_LANGUAGE", language.as_str());

        info!(language = %language, script = %script.display(), "Running instrumentation");
        let stdout = self.runner.run(&spec).await.into_result(Stage::Instrument)?;
        debug!(output_bytes = stdout.len(), "Instrumentation finished");
        Ok(())
    }

    /// Validates the generated build descriptor by building it (profile v2 only)
    pub async fn build_image(
        &self,
        workspace: &Path,
        artifacts: &ContainerArtifacts,
    ) -> Result<(), PipelineError> {
        if self.settings.profile == StageProfile::V1 {
            debug!("Profile v1 builds during compose up, skipping image build");
            return Ok(());
        }

        let spec = ProcessSpec::new(
            Stage::Containerize,
            &self.settings.container_cli,
            self.settings.build_timeout,
        )
        .args(["build", "-f"])
        .arg(artifacts.dockerfile.to_string_lossy())
        .args(["-t", artifacts.service_name.as_str()])
        .arg(workspace.to_string_lossy())
        .cwd(workspace);

        info!(service = %artifacts.service_name, "Building container image");
        self.runner.run(&spec).await.into_result(Stage::Containerize)?;
        Ok(())
    }

    /// Starts the composed service detached
    pub async fn compose_up(&self, workspace: &Path, compose_file: &Path) -> Result<(), PipelineError> {
        let compose = compose_file.to_string_lossy();
        let spec = match self.settings.profile {
            StageProfile::V1 => ProcessSpec::new(
                Stage::Run,
                &self.settings.compose_bin,
                self.settings.run_timeout,
            )
            .args(["-f", &*compose, "up", "-d"]),
            StageProfile::V2 => ProcessSpec::new(
                Stage::Run,
                &self.settings.container_cli,
                self.settings.run_timeout,
            )
            .args(["compose", "-f", &*compose, "--project-directory"])
            .arg(workspace.to_string_lossy())
            .args(["up", "-d"]),
        }
        .cwd(workspace);

        info!(compose_file = %compose_file.display(), profile = %self.settings.profile, "Starting containers");
        self.runner.run(&spec).await.into_result(Stage::Run)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::StageOutcome;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<ProcessSpec>>,
    }

    #[async_trait]
    impl ProcessRunner for Recorder {
        async fn run(&self, spec: &ProcessSpec) -> StageOutcome {
            self.calls.lock().unwrap().push(spec.clone());
            StageOutcome::success("")
        }
    }

    fn settings(dir: &Path, profile: StageProfile) -> ExecutorSettings {
        ExecutorSettings {
            instrumentation_dir: dir.join("instrumentation"),
            script_interpreter: "bash".to_string(),
            container_cli: "docker".to_string(),
            compose_bin: "docker-compose".to_string(),
            profile,
            instrument_timeout: Duration::from_secs(1),
            build_timeout: Duration::from_secs(2),
            run_timeout: Duration::from_secs(3),
        }
    }

    fn artifacts(ws: &Path) -> ContainerArtifacts {
        ContainerArtifacts {
            dockerfile: ws.join("Dockerfile.tracepack"),
            compose_file: ws.join("docker-compose.user.yml"),
            service_name: "app-0123456789ab".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_script_is_not_found() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let executors = StageExecutors::new(recorder.clone(), settings(dir.path(), StageProfile::V2));

        let result = executors.instrument(Language::Python, dir.path()).await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_instrument_invokes_script_with_workspace() {
        let dir = TempDir::new().unwrap();
        let script_dir = dir.path().join("instrumentation/nodejs");
        std::fs::create_dir_all(&script_dir).unwrap();
        std::fs::write(script_dir.join(SETUP_SCRIPT), "#!/bin/sh\n").unwrap();

        let recorder = Arc::new(Recorder::default());
        let executors = StageExecutors::new(recorder.clone(), settings(dir.path(), StageProfile::V2));
        executors.instrument(Language::Node, dir.path()).await.unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "bash");
        assert!(calls[0].args[0].ends_with("nodejs/setup.sh"));
        assert_eq!(calls[0].args[1], dir.path().to_string_lossy());
        assert_eq!(calls[0].timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_profile_v1_skips_build_and_uses_standalone_compose() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let executors = StageExecutors::new(recorder.clone(), settings(dir.path(), StageProfile::V1));
        let artifacts = artifacts(dir.path());

        executors.build_image(dir.path(), &artifacts).await.unwrap();
        executors
            .compose_up(dir.path(), &artifacts.compose_file)
            .await
            .unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "docker-compose");
        assert_eq!(calls[0].args[0], "-f");
        assert_eq!(&calls[0].args[2..], ["up", "-d"]);
    }

    #[tokio::test]
    async fn test_profile_v2_builds_then_uses_compose_plugin() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let executors = StageExecutors::new(recorder.clone(), settings(dir.path(), StageProfile::V2));
        let artifacts = artifacts(dir.path());

        executors.build_image(dir.path(), &artifacts).await.unwrap();
        executors
            .compose_up(dir.path(), &artifacts.compose_file)
            .await
            .unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].stage, Stage::Containerize);
        assert_eq!(calls[0].args[0], "build");
        assert!(calls[0].args.contains(&"app-0123456789ab".to_string()));
        assert_eq!(calls[1].stage, Stage::Run);
        assert_eq!(calls[1].args[0], "compose");
        assert!(calls[1].args.contains(&"--project-directory".to_string()));
        assert_eq!(calls[1].timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("v1".parse::<StageProfile>().unwrap(), StageProfile::V1);
        assert_eq!("V2".parse::<StageProfile>().unwrap(), StageProfile::V2);
        assert!("v3".parse::<StageProfile>().is_err());
        assert_eq!(StageProfile::default(), StageProfile::V2);
    }
}

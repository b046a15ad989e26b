//! Shared fixtures for integration tests: a scriptable fake process runner
//! and a throwaway base directory with instrumentation scripts in place.

#![allow(dead_code)]

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracepack::executor::StageProfile;
use tracepack::{PipelineController, ProcessRunner, ProcessSpec, StageOutcome, TracepackConfig};

type Handler = dyn Fn(&ProcessSpec) -> StageOutcome + Send + Sync;

/// Records every invocation and answers with the handler's outcome
pub struct FakeRunner {
    handler: Box<Handler>,
    calls: Mutex<Vec<ProcessSpec>>,
}

impl FakeRunner {
    pub fn new(handler: impl Fn(&ProcessSpec) -> StageOutcome + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(|_| StageOutcome::success(""))
    }

    pub fn calls(&self) -> Vec<ProcessSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Program plus first argument of every call, e.g. `docker build`
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|spec| match spec.args.first() {
                Some(first) => format!("{} {}", spec.program, first),
                None => spec.program.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, spec: &ProcessSpec) -> StageOutcome {
        self.calls.lock().unwrap().push(spec.clone());
        (self.handler)(spec)
    }
}

pub struct Harness {
    pub root: TempDir,
    pub config: TracepackConfig,
    pub runner: Arc<FakeRunner>,
}

impl Harness {
    pub fn new(runner: FakeRunner) -> Self {
        let root = TempDir::new().unwrap();
        let scripts = root.path().join("instrumentation");
        for lang in ["python", "nodejs", "java"] {
            fs::create_dir_all(scripts.join(lang)).unwrap();
            fs::write(scripts.join(lang).join("setup.sh"), "#!/bin/sh\nexit 0\n").unwrap();
        }

        let mut config = TracepackConfig::default();
        config.base_dir = root.path().join("user-apps");
        config.instrumentation_dir = scripts;
        config.script_interpreter = "bash".to_string();
        config.container_cli = "docker".to_string();
        config.git_bin = "git".to_string();
        config.stage_profile = StageProfile::V2;
        config.telemetry_network = "telemetry_default".to_string();

        Self {
            root,
            config,
            runner: Arc::new(runner),
        }
    }

    pub fn controller(&self) -> PipelineController {
        PipelineController::new(&self.config, self.runner.clone(), None).unwrap()
    }

    /// Writes `files` under a fresh source directory and returns its path
    pub fn source(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.root.path().join("sources").join(name);
        write_files(&dir, files);
        dir
    }
}

pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let path = dir.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    fs::create_dir_all(dir).unwrap();
}

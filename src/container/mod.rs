//! Container descriptor generation
//!
//! Writes one build descriptor and one composition descriptor into the
//! workspace. Regeneration overwrites both files in place.

pub mod templates;

use crate::detection::{workspace_walker, Language};
use crate::error::PipelineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Generated build descriptor; never collides with a user's own Dockerfile
pub const DOCKERFILE_NAME: &str = "Dockerfile.tracepack";
pub const COMPOSE_FILE_NAME: &str = "docker-compose.user.yml";

const PYTHON_ENTRY_POINTS: &[&str] = &[
    "main.py",
    "app.py",
    "server.py",
    "run.py",
    "wsgi.py",
    "__main__.py",
    "src/main.py",
    "app/main.py",
];

const NODE_ENTRY_POINTS: &[&str] = &[
    "index.js",
    "server.js",
    "app.js",
    "main.js",
    "src/index.js",
    "src/server.js",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerArtifacts {
    pub dockerfile: PathBuf,
    pub compose_file: PathBuf,
    pub service_name: String,
}

#[derive(Debug, Clone)]
pub struct ComposeSettings {
    pub network: String,
    pub otlp_endpoint: String,
}

/// How the container starts the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    PythonScript(String),
    NodeScript(String),
    NpmStart,
    Jar(String),
    Maven,
    JavaMain(String),
    Unknown,
}

pub fn detect_entry_point(workspace: &Path, language: Language) -> EntryPoint {
    match language {
        Language::Python => first_existing(workspace, PYTHON_ENTRY_POINTS)
            .or_else(|| shallowest_with_extension(workspace, &["py"]))
            .map(EntryPoint::PythonScript)
            .unwrap_or_else(|| EntryPoint::PythonScript("main.py".to_string())),
        Language::Node => {
            if has_start_script(workspace) {
                EntryPoint::NpmStart
            } else {
                first_existing(workspace, NODE_ENTRY_POINTS)
                    .map(EntryPoint::NodeScript)
                    .unwrap_or(EntryPoint::NpmStart)
            }
        }
        Language::Java => {
            if let Some(jar) = shallowest_with_extension(workspace, &["jar", "war"]) {
                EntryPoint::Jar(jar)
            } else if workspace.join("pom.xml").is_file() {
                EntryPoint::Maven
            } else {
                find_main_class(workspace)
                    .map(EntryPoint::JavaMain)
                    .unwrap_or(EntryPoint::Unknown)
            }
        }
        Language::Unknown => EntryPoint::Unknown,
    }
}

/// Writes both descriptors, replacing any previous generation
pub fn generate(
    workspace: &Path,
    language: Language,
    service_name: &str,
    settings: &ComposeSettings,
) -> Result<ContainerArtifacts, PipelineError> {
    let entry = detect_entry_point(workspace, language);
    debug!(language = %language, entry = ?entry, "Selected container entry point");

    let dockerfile = match language {
        Language::Python => match &entry {
            EntryPoint::PythonScript(script) => templates::python_dockerfile(script),
            _ => templates::python_dockerfile("main.py"),
        },
        Language::Node => {
            templates::node_dockerfile(&entry, workspace.join("otel-wrapper.js").is_file())
        }
        Language::Java => templates::java_dockerfile(&entry),
        Language::Unknown => {
            return Err(PipelineError::UnsupportedLanguage {
                id: service_name.to_string(),
            })
        }
    };

    let compose = templates::compose_file(
        service_name,
        DOCKERFILE_NAME,
        &settings.network,
        &settings.otlp_endpoint,
    )
    .map_err(|e| PipelineError::workspace(workspace, format!("cannot render compose file: {}", e)))?;

    let artifacts = ContainerArtifacts {
        dockerfile: workspace.join(DOCKERFILE_NAME),
        compose_file: workspace.join(COMPOSE_FILE_NAME),
        service_name: service_name.to_string(),
    };

    fs::write(&artifacts.dockerfile, dockerfile)
        .map_err(|e| PipelineError::workspace(&artifacts.dockerfile, e))?;
    fs::write(&artifacts.compose_file, compose)
        .map_err(|e| PipelineError::workspace(&artifacts.compose_file, e))?;

    info!(service = %service_name, language = %language, "Generated container descriptors");
    Ok(artifacts)
}

fn first_existing(workspace: &Path, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|c| workspace.join(c).is_file())
        .map(|c| c.to_string())
}

fn shallowest_with_extension(workspace: &Path, extensions: &[&str]) -> Option<String> {
    workspace_walker(workspace)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .map(|x| extensions.contains(&x.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .filter_map(|e| {
            let rel = e.path().strip_prefix(workspace).ok()?.to_string_lossy().replace('\\', "/");
            Some((e.depth(), rel))
        })
        .min()
        .map(|(_, rel)| rel)
}

fn has_start_script(workspace: &Path) -> bool {
    fs::read_to_string(workspace.join("package.json"))
        .ok()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .and_then(|pkg| pkg.get("scripts")?.get("start").cloned())
        .map(|start| start.is_string())
        .unwrap_or(false)
}

fn package_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*package\s+([A-Za-z_][\w.]*)\s*;").expect("valid regex")
    })
}

fn main_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"public\s+static\s+void\s+main\s*\(").expect("valid regex")
    })
}

/// Fully qualified name of the shallowest class declaring `main`
fn find_main_class(workspace: &Path) -> Option<String> {
    let mut sources: Vec<(usize, PathBuf)> = workspace_walker(workspace)
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("java"))
        .map(|e| (e.depth(), e.into_path()))
        .collect();
    sources.sort();

    sources.into_iter().find_map(|(_, path)| {
        let source = fs::read_to_string(&path).ok()?;
        if !main_regex().is_match(&source) {
            return None;
        }
        let class = path.file_stem()?.to_string_lossy().into_owned();
        match package_regex().captures(&source) {
            Some(caps) => Some(format!("{}.{}", &caps[1], class)),
            None => Some(class),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings() -> ComposeSettings {
        ComposeSettings {
            network: "telemetry_default".to_string(),
            otlp_endpoint: "http://otel-collector:4317".to_string(),
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_python_entry_point_preference() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/tool.py", "");
        assert_eq!(
            detect_entry_point(dir.path(), Language::Python),
            EntryPoint::PythonScript("pkg/tool.py".to_string())
        );

        write(dir.path(), "app.py", "");
        assert_eq!(
            detect_entry_point(dir.path(), Language::Python),
            EntryPoint::PythonScript("app.py".to_string())
        );
    }

    #[test]
    fn test_node_entry_point_prefers_start_script() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "server.js", "");
        write(dir.path(), "package.json", r#"{"name":"x"}"#);
        assert_eq!(
            detect_entry_point(dir.path(), Language::Node),
            EntryPoint::NodeScript("server.js".to_string())
        );

        write(dir.path(), "package.json", r#"{"scripts":{"start":"node server.js"}}"#);
        assert_eq!(detect_entry_point(dir.path(), Language::Node), EntryPoint::NpmStart);
    }

    #[test]
    fn test_java_entry_points() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "src/com/acme/Main.java",
            "package com.acme;\npublic class Main { public static void main(String[] a) {} }\n",
        );
        assert_eq!(
            detect_entry_point(dir.path(), Language::Java),
            EntryPoint::JavaMain("com.acme.Main".to_string())
        );

        write(dir.path(), "pom.xml", "<project/>");
        assert_eq!(detect_entry_point(dir.path(), Language::Java), EntryPoint::Maven);

        write(dir.path(), "dist/app.jar", "");
        assert_eq!(
            detect_entry_point(dir.path(), Language::Java),
            EntryPoint::Jar("dist/app.jar".to_string())
        );
    }

    #[test]
    fn test_generate_overwrites_in_place() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.py", "print('hi')\n");

        let first = generate(dir.path(), Language::Python, "app-0123456789ab", &settings()).unwrap();
        let second = generate(dir.path(), Language::Python, "app-0123456789ab", &settings()).unwrap();
        assert_eq!(first, second);

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.iter().filter(|n| *n == DOCKERFILE_NAME).count(), 1);
        assert_eq!(names.iter().filter(|n| *n == COMPOSE_FILE_NAME).count(), 1);
        assert_eq!(names.len(), 3);

        let dockerfile = fs::read_to_string(&first.dockerfile).unwrap();
        assert!(dockerfile.contains("python:3.11-slim"));
        assert!(dockerfile.contains("main.py"));
        let compose = fs::read_to_string(&first.compose_file).unwrap();
        assert!(compose.contains("app-0123456789ab"));
    }

    #[test]
    fn test_generate_refuses_unknown_language() {
        let dir = TempDir::new().unwrap();
        let result = generate(dir.path(), Language::Unknown, "app-x", &settings());
        assert!(matches!(result, Err(PipelineError::UnsupportedLanguage { .. })));
    }
}

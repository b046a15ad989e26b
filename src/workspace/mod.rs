//! Workspace store
//!
//! Maps an application identifier to an isolated directory under a base
//! path. The store owns creation and destruction of those directories; it does
//! not serialize access to them (see [`crate::pipeline::AppLocks`]).

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};
use uuid::Uuid;

/// Opaque application identifier, generated at ingestion and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(Uuid);

impl AppId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Container-safe service name derived deterministically from the identifier
    pub fn service_name(&self) -> String {
        let simple = self.0.simple().to_string();
        format!("app-{}", &simple[..12])
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for AppId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(AppId)
            .map_err(|_| PipelineError::NotFound(format!("application '{}'", s)))
    }
}

pub struct WorkspaceStore {
    base: PathBuf,
}

impl WorkspaceStore {
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let base = base.into();
        fs::create_dir_all(&base).map_err(|e| PipelineError::workspace(&base, e))?;
        let base = base
            .canonicalize()
            .map_err(|e| PipelineError::workspace(&base, e))?;
        debug!(base = %base.display(), "Workspace store ready");
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Allocates a fresh identifier and its empty workspace directory
    pub fn create(&self) -> Result<AppId, PipelineError> {
        loop {
            let id = AppId::generate();
            let path = self.base.join(id.to_string());
            match fs::create_dir(&path) {
                Ok(()) => {
                    debug!(app_id = %id, path = %path.display(), "Created workspace");
                    return Ok(id);
                }
                // Fresh identifiers only; a collision simply draws another one.
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    warn!(app_id = %id, "Workspace identifier collision, regenerating");
                    continue;
                }
                Err(e) => return Err(PipelineError::workspace(path, e)),
            }
        }
    }

    pub fn path_for(&self, id: &AppId) -> Result<PathBuf, PipelineError> {
        let path = self.base.join(id.to_string());
        if path.is_dir() {
            Ok(path)
        } else {
            Err(PipelineError::NotFound(format!("workspace for application {}", id)))
        }
    }

    pub fn exists(&self, id: &AppId) -> bool {
        self.base.join(id.to_string()).is_dir()
    }

    /// Removes the workspace tree; a missing workspace is not an error
    pub fn destroy(&self, id: &AppId) -> Result<(), PipelineError> {
        let path = self.base.join(id.to_string());
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                debug!(app_id = %id, "Destroyed workspace");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::workspace(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_path_for() {
        let temp_dir = TempDir::new().unwrap();
        let store = WorkspaceStore::new(temp_dir.path().join("apps")).unwrap();

        let id = store.create().unwrap();
        let path = store.path_for(&id).unwrap();

        assert!(path.is_dir());
        assert!(path.starts_with(store.base()));
        assert!(store.exists(&id));
    }

    #[test]
    fn test_path_for_unknown_id_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = WorkspaceStore::new(temp_dir.path()).unwrap();

        let result = store.path_for(&AppId::generate());
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }

    #[test]
    fn test_destroy_removes_tree_and_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = WorkspaceStore::new(temp_dir.path()).unwrap();

        let id = store.create().unwrap();
        let path = store.path_for(&id).unwrap();
        fs::create_dir_all(path.join("src/nested")).unwrap();
        fs::write(path.join("src/nested/app.py"), "print('hi')").unwrap();

        store.destroy(&id).unwrap();
        assert!(!path.exists());
        store.destroy(&id).unwrap();
    }

    #[test]
    fn test_identifiers_never_collide() {
        let temp_dir = TempDir::new().unwrap();
        let store = WorkspaceStore::new(temp_dir.path()).unwrap();

        let ids: HashSet<AppId> = (0..50).map(|_| store.create().unwrap()).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_app_id_parse_and_service_name() {
        let id = AppId::generate();
        let parsed: AppId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);

        let name = id.service_name();
        assert!(name.starts_with("app-"));
        assert_eq!(name.len(), 16);
        assert_eq!(name, parsed.service_name());

        assert!(matches!(
            "not-a-uuid".parse::<AppId>(),
            Err(PipelineError::NotFound(_))
        ));
    }
}

//! Per-application record persistence
//!
//! One pretty-printed JSON file per identifier, written atomically so a crash
//! mid-write never leaves a truncated record behind.

use super::application::Application;
use crate::error::PipelineError;
use crate::workspace::AppId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| PipelineError::workspace(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &AppId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn load(&self, id: &AppId) -> Result<Application, PipelineError> {
        let path = self.path_for(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::NotFound(format!("application {}", id)))
            }
            Err(e) => return Err(PipelineError::workspace(&path, e)),
        };
        serde_json::from_str(&content)
            .map_err(|e| PipelineError::workspace(&path, format!("corrupt state record: {}", e)))
    }

    pub fn save(&self, app: &Application) -> Result<(), PipelineError> {
        let path = self.path_for(&app.id);
        let tmp = self.dir.join(format!(".{}.json.tmp", app.id));
        let content = serde_json::to_string_pretty(app)
            .map_err(|e| PipelineError::workspace(&path, format!("cannot serialize state: {}", e)))?;

        fs::write(&tmp, content).map_err(|e| PipelineError::workspace(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| PipelineError::workspace(&path, e))?;
        debug!(app_id = %app.id, state = %app.state, "Persisted application state");
        Ok(())
    }

    /// Missing records are not an error
    pub fn delete(&self, id: &AppId) -> Result<(), PipelineError> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::workspace(path, e)),
        }
    }

    /// Every readable record, oldest first. Corrupt records are skipped.
    pub fn list(&self) -> Result<Vec<Application>, PipelineError> {
        let mut apps = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| PipelineError::workspace(&self.dir, e))? {
            let entry = entry.map_err(|e| PipelineError::workspace(&self.dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            let Ok(id) = stem.parse::<AppId>() else {
                continue;
            };
            match self.load(&id) {
                Ok(app) => apps.push(app),
                Err(e) => warn!(app_id = %id, error = %e, "Skipping unreadable state record"),
            }
        }
        apps.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(apps)
    }
}

use super::workspace_walker;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Manifest whose presence anywhere in the tree marks a node project
const NODE_MANIFEST: &str = "package.json";
const PYTHON_EXTENSIONS: &[&str] = &["py"];
const JAVA_EXTENSIONS: &[&str] = &["java"];
const JAVA_PACKAGE_EXTENSIONS: &[&str] = &["jar", "war"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Node,
    Java,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Node => "node",
            Language::Java => "java",
            Language::Unknown => "unknown",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Language::Unknown)
    }

    /// Directory under the instrumentation root holding this language's setup script
    pub fn instrumentation_dir(&self) -> Option<&'static str> {
        match self {
            Language::Python => Some("python"),
            Language::Node => Some("nodejs"),
            Language::Java => Some("java"),
            Language::Unknown => None,
        }
    }

    /// Source extensions used by the context engine's fallback walk
    pub fn source_extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => PYTHON_EXTENSIONS,
            Language::Node => &["js", "mjs", "cjs", "jsx", "ts", "tsx"],
            Language::Java => &["java", "kt", "properties"],
            Language::Unknown => &["py", "js", "ts", "java", "sh", "go", "rb"],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" => Ok(Language::Python),
            "node" | "nodejs" => Ok(Language::Node),
            "java" => Ok(Language::Java),
            "unknown" => Ok(Language::Unknown),
            other => Err(format!("Unknown language: {}", other)),
        }
    }
}

/// Evidence gathered from one walk of a workspace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageCounts {
    pub has_node_manifest: bool,
    pub python_files: usize,
    pub java_files: usize,
    pub java_packages: usize,
}

impl LanguageCounts {
    /// Applies the fixed precedence: node manifest, python-only, any java
    /// evidence, any python, unknown
    pub fn decide(&self) -> Language {
        if self.has_node_manifest {
            Language::Node
        } else if self.python_files > 0 && self.java_files == 0 {
            Language::Python
        } else if self.java_files > 0 || self.java_packages > 0 {
            Language::Java
        } else if self.python_files > 0 {
            Language::Python
        } else {
            Language::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageClassifier;

impl LanguageClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, workspace: &Path) -> Result<Language, PipelineError> {
        let counts = self.count(workspace)?;
        let language = counts.decide();
        debug!(
            workspace = %workspace.display(),
            language = %language,
            python_files = counts.python_files,
            java_files = counts.java_files,
            java_packages = counts.java_packages,
            node_manifest = counts.has_node_manifest,
            "Classified workspace"
        );
        Ok(language)
    }

    pub fn count(&self, workspace: &Path) -> Result<LanguageCounts, PipelineError> {
        if !workspace.is_dir() {
            return Err(PipelineError::workspace(workspace, "not a directory"));
        }

        let mut counts = LanguageCounts::default();

        for result in workspace_walker(workspace) {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable entry during classification");
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if name == NODE_MANIFEST {
                counts.has_node_manifest = true;
                break;
            }

            let extension = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            if let Some(ext) = extension.as_deref() {
                if PYTHON_EXTENSIONS.contains(&ext) {
                    counts.python_files += 1;
                } else if JAVA_EXTENSIONS.contains(&ext) {
                    counts.java_files += 1;
                } else if JAVA_PACKAGE_EXTENSIONS.contains(&ext) {
                    counts.java_packages += 1;
                }
            }
        }

        Ok(counts)
    }
}

use crate::detection::Language;

/// README spellings probed at the workspace root, in preference order
pub const README_NAMES: &[&str] = &[
    "README.md",
    "README.rst",
    "README.txt",
    "README",
    "readme.md",
    "Readme.md",
];

const PYTHON_KEY_FILES: &[&str] = &[
    "requirements.txt",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "Pipfile",
    "main.py",
    "app.py",
    "server.py",
    "wsgi.py",
    "manage.py",
    "__main__.py",
    "src/main.py",
    "app/main.py",
];

const NODE_KEY_FILES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "index.js",
    "server.js",
    "app.js",
    "main.js",
    "src/index.js",
    "src/index.ts",
    "src/server.js",
    "src/server.ts",
    "src/app.ts",
];

const JAVA_KEY_FILES: &[&str] = &[
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "src/main/resources/application.properties",
    "src/main/resources/application.yml",
    "Main.java",
    "src/Main.java",
];

const GENERIC_KEY_FILES: &[&str] = &[
    "Dockerfile",
    "docker-compose.yml",
    "Makefile",
    "Procfile",
];

/// Manifest and build files first, then well-known entry points
pub fn key_files_for(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => PYTHON_KEY_FILES,
        Language::Node => NODE_KEY_FILES,
        Language::Java => JAVA_KEY_FILES,
        Language::Unknown => GENERIC_KEY_FILES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifests_come_first() {
        assert_eq!(key_files_for(Language::Python)[0], "requirements.txt");
        assert_eq!(key_files_for(Language::Node)[0], "package.json");
        assert_eq!(key_files_for(Language::Java)[0], "pom.xml");
    }

    #[test]
    fn test_tables_have_no_duplicates() {
        for language in [Language::Python, Language::Node, Language::Java, Language::Unknown] {
            let files = key_files_for(language);
            let mut sorted = files.to_vec();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), files.len(), "duplicate key file for {}", language);
        }
    }
}

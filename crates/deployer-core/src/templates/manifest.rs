//! Template manifest types and parsing

use serde::{Deserialize, Serialize};

/// A file copied from the template set into the generated project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFile {
    /// Source path, relative to the directory holding the manifest
    pub source: String,

    /// Destination path in the project (defaults to source if not specified)
    #[serde(default)]
    pub dest: Option<String>,

    /// Force the generated file to be executable
    #[serde(default)]
    pub executable: bool,
}

impl TemplateFile {
    /// Get the destination path (falls back to source if dest not specified)
    pub fn destination(&self) -> &str {
        self.dest.as_deref().unwrap_or(&self.source)
    }
}

/// Root template manifest (templates/template.yaml)
/// Lists available platform templates and files shared by all of them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootManifest {
    /// List of template directory names
    pub templates: Vec<String>,

    /// Shared files from the root templates/ directory included in every template
    #[serde(default)]
    pub shared_files: Vec<TemplateFile>,
}

/// Per-platform manifest (templates/<name>/template.yaml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateManifest {
    /// Display name of the template
    pub name: String,

    /// Description of what the template provides
    pub description: String,

    /// Semver version for CLI compatibility checking
    pub version: String,

    /// Directories created before any file is copied
    #[serde(default)]
    pub directories: Vec<String>,

    /// Platform-specific files to copy
    pub files: Vec<TemplateFile>,
}

//! Template storage: built into the binary or read from a local directory

use crate::error::{DeployError, Result};
use rust_embed::RustEmbed;
use std::path::PathBuf;
use tokio::fs;

/// Template set compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
struct BuiltinTemplates;

/// Template source - either the built-in set or a local directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Builtin,
    Local(PathBuf),
}

impl TemplateSource {
    /// Built-in templates unless a directory is given
    pub fn from_dir(dir: Option<PathBuf>) -> Self {
        match dir {
            Some(path) => Self::Local(path),
            None => Self::Builtin,
        }
    }

    /// Human readable origin for log messages
    pub fn describe(&self) -> String {
        match self {
            TemplateSource::Builtin => "built-in templates".to_string(),
            TemplateSource::Local(path) => path.display().to_string(),
        }
    }

    /// Read a file by its `/`-separated path relative to the template root
    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        match self {
            TemplateSource::Builtin => BuiltinTemplates::get(path)
                .map(|file| file.data.into_owned())
                .ok_or_else(|| DeployError::template_read(path, "not found in built-in templates")),
            TemplateSource::Local(root) => {
                let full_path = root.join(path);
                fs::read(&full_path)
                    .await
                    .map_err(|e| DeployError::template_read(full_path.display().to_string(), e))
            }
        }
    }

    /// Read a UTF-8 file relative to the template root
    pub async fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|e| DeployError::template_read(path, e))
    }

    pub async fn exists(&self, path: &str) -> bool {
        match self {
            TemplateSource::Builtin => BuiltinTemplates::get(path).is_some(),
            TemplateSource::Local(root) => fs::metadata(root.join(path))
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
        }
    }

    /// Whether the stored file carries an executable bit (local sources only)
    pub async fn is_executable(&self, path: &str) -> bool {
        match self {
            TemplateSource::Builtin => false,
            TemplateSource::Local(root) => match fs::metadata(root.join(path)).await {
                Ok(metadata) => has_exec_bit(&metadata),
                Err(_) => false,
            },
        }
    }
}

#[cfg(unix)]
fn has_exec_bit(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_exec_bit(_metadata: &std::fs::Metadata) -> bool {
    false
}

//! Record of every file written into a generated project

use crate::error::{DeployError, Result};
use crate::metadata::AppMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File name of the persisted manifest at the project root
pub const MANIFEST_FILE: &str = ".deploy-manifest.json";

/// Who generated the project and for which app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestHeader {
    pub generator_version: String,
    pub platform: String,
    pub template_version: String,
    pub app: AppMetadata,
}

/// One materialized file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the template root
    pub source: String,
    /// Absolute path inside the project root
    pub destination: PathBuf,
    /// Placeholders replaced in this file, with their values
    pub substitutions: BTreeMap<String, String>,
    /// Placeholders left verbatim because no value was known
    #[serde(default)]
    pub unresolved: Vec<String>,
    #[serde(default)]
    pub binary: bool,
    #[serde(default)]
    pub executable: bool,
}

/// Ordered list of everything the materializer wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectManifest {
    #[serde(flatten)]
    pub header: ManifestHeader,
    pub entries: Vec<ManifestEntry>,
}

impl ProjectManifest {
    pub fn new(header: ManifestHeader) -> Self {
        Self {
            header,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    /// `(destination, key)` for every placeholder left in the output
    pub fn unresolved(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.entries.iter().flat_map(|entry| {
            entry
                .unresolved
                .iter()
                .map(move |key| (entry.destination.as_path(), key.as_str()))
        })
    }

    /// Persist to `<root>/.deploy-manifest.json` via a temp file and rename
    pub async fn save(&self, root: &Path) -> Result<PathBuf> {
        let path = root.join(MANIFEST_FILE);
        let tmp_path = root.join(format!("{}.tmp", MANIFEST_FILE));
        let write_error = |message: String| DeployError::ManifestWrite {
            path: path.clone(),
            message,
        };

        let content = serde_json::to_string_pretty(self).map_err(|e| write_error(e.to_string()))?;
        fs::write(&tmp_path, content)
            .await
            .map_err(|e| write_error(e.to_string()))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| write_error(e.to_string()))?;

        tracing::debug!(path = %path.display(), entries = self.entries.len(), "saved project manifest");
        Ok(path)
    }

    /// Read a previously saved manifest
    pub async fn load(root: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = root.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

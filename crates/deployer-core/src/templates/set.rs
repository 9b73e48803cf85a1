//! A resolved, validated template set for one platform
//!
//! Loading reads the root manifest, the platform manifest and checks every
//! entry before the caller touches the destination: destinations must stay
//! inside the project root and every source must exist.

use super::manifest::{RootManifest, TemplateFile, TemplateManifest};
use super::source::TemplateSource;
use crate::error::{DeployError, Result};
use crate::project::manifest::MANIFEST_FILE;
use std::collections::{BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};

/// One file to materialize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    /// Path relative to the template root
    pub source: String,
    /// Path relative to the project root
    pub dest: String,
    pub executable: bool,
}

/// Validated template set for a single platform
#[derive(Debug, Clone)]
pub struct TemplateSet {
    source: TemplateSource,
    pub template: String,
    pub name: String,
    pub description: String,
    pub version: String,
    directories: Vec<String>,
    entries: Vec<TemplateEntry>,
}

impl TemplateSet {
    /// Load and validate `template` (e.g. `ios`) from `source`
    pub async fn load(source: TemplateSource, template: &str) -> Result<Self> {
        let root_content = source.read_to_string("template.yaml").await?;
        let root: RootManifest = serde_yaml::from_str(&root_content).map_err(|e| {
            DeployError::invalid_template_set(format!("failed to parse root template.yaml: {}", e))
        })?;

        if !root.templates.iter().any(|t| t == template) {
            return Err(DeployError::invalid_template_set(format!(
                "template '{}' is not listed in {} (available: {})",
                template,
                source.describe(),
                root.templates.join(", ")
            )));
        }

        let manifest_path = format!("{}/template.yaml", template);
        let manifest_content = source.read_to_string(&manifest_path).await?;
        let manifest: TemplateManifest = serde_yaml::from_str(&manifest_content).map_err(|e| {
            DeployError::invalid_template_set(format!(
                "failed to parse {}: {}",
                manifest_path, e
            ))
        })?;

        let entries = merge_entries(template, &root.shared_files, &manifest.files);

        for dir in &manifest.directories {
            ensure_contained(dir)?;
        }
        for entry in &entries {
            ensure_contained(&entry.dest)?;
            if !is_contained(&entry.source) {
                return Err(DeployError::invalid_template_set(format!(
                    "source '{}' escapes the template directory",
                    entry.source
                )));
            }
            if entry.dest == MANIFEST_FILE {
                return Err(DeployError::invalid_template_set(format!(
                    "'{}' is reserved for the project manifest",
                    MANIFEST_FILE
                )));
            }
            if !source.exists(&entry.source).await {
                return Err(DeployError::template_read(
                    entry.source.clone(),
                    format!("listed in the manifest but missing from {}", source.describe()),
                ));
            }
        }

        tracing::debug!(
            template,
            files = entries.len(),
            origin = %source.describe(),
            "loaded template set"
        );

        Ok(Self {
            source,
            template: template.to_string(),
            name: manifest.name,
            description: manifest.description,
            version: manifest.version,
            directories: manifest.directories,
            entries,
        })
    }

    pub fn entries(&self) -> &[TemplateEntry] {
        &self.entries
    }

    /// Every directory the project needs, parents before children
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs = BTreeSet::new();
        let declared = self.directories.iter().map(PathBuf::from);
        let file_parents = self
            .entries
            .iter()
            .filter_map(|e| Path::new(&e.dest).parent().map(Path::to_path_buf));

        for dir in declared.chain(file_parents) {
            for ancestor in dir.ancestors() {
                if !ancestor.as_os_str().is_empty() {
                    dirs.insert(ancestor.to_path_buf());
                }
            }
        }

        let mut dirs: Vec<PathBuf> = dirs.into_iter().collect();
        dirs.sort_by_key(|d| (d.components().count(), d.clone()));
        dirs
    }

    pub async fn read(&self, entry: &TemplateEntry) -> Result<Vec<u8>> {
        self.source.read(&entry.source).await
    }

    pub async fn source_is_executable(&self, entry: &TemplateEntry) -> bool {
        self.source.is_executable(&entry.source).await
    }
}

/// Shared files first, then platform files; a platform file replaces a shared
/// file with the same destination
fn merge_entries(
    template: &str,
    shared: &[TemplateFile],
    own: &[TemplateFile],
) -> Vec<TemplateEntry> {
    let own_dests: HashSet<&str> = own.iter().map(TemplateFile::destination).collect();

    let shared_entries = shared
        .iter()
        .filter(|f| !own_dests.contains(f.destination()))
        .map(|f| TemplateEntry {
            source: f.source.clone(),
            dest: f.destination().to_string(),
            executable: f.executable,
        });

    let own_entries = own.iter().map(|f| TemplateEntry {
        source: format!("{}/{}", template, f.source),
        dest: f.destination().to_string(),
        executable: f.executable,
    });

    shared_entries.chain(own_entries).collect()
}

/// Relative, non-empty and free of `..`
fn is_contained(path: &str) -> bool {
    let path = Path::new(path);
    let mut has_normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    has_normal
}

fn ensure_contained(path: &str) -> Result<()> {
    if is_contained(path) {
        Ok(())
    } else {
        Err(DeployError::PathEscapes {
            path: path.to_string(),
        })
    }
}

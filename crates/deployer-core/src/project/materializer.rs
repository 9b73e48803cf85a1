//! Writes a template set into a fresh project directory

use super::manifest::{ManifestEntry, ManifestHeader, ProjectManifest};
use crate::error::{DeployError, Result};
use crate::templates::{is_binary, render, Escape, Substitutions, TemplateEntry, TemplateSet};
use std::io;
use std::path::Path;
use tokio::fs;

/// Create `dest_root` and populate it from `templates`
///
/// The root must not exist yet. Directories are created top-down before any
/// file is written; text files are rendered with `substitutions`, binary files
/// are copied byte for byte. The manifest is persisted once, after the last
/// file, so an aborted run never leaves one behind.
pub async fn materialize(
    dest_root: &Path,
    templates: &TemplateSet,
    substitutions: &Substitutions,
    header: ManifestHeader,
) -> Result<ProjectManifest> {
    if fs::symlink_metadata(dest_root).await.is_ok() {
        return Err(DeployError::DestinationExists {
            path: dest_root.to_path_buf(),
        });
    }

    create_root(dest_root).await?;

    for dir in templates.directories() {
        let path = dest_root.join(&dir);
        fs::create_dir_all(&path)
            .await
            .map_err(|source| DeployError::TemplateWrite { path, source })?;
    }

    let mut manifest = ProjectManifest::new(header);
    for entry in templates.entries() {
        let record = write_entry(dest_root, templates, entry, substitutions).await?;
        if !record.unresolved.is_empty() {
            tracing::warn!(
                file = %entry.dest,
                keys = %record.unresolved.join(", "),
                "unresolved placeholders left in output"
            );
        }
        manifest.push(record);
    }

    manifest.save(dest_root).await?;
    tracing::info!(
        root = %dest_root.display(),
        files = manifest.entries.len(),
        "project materialized"
    );
    Ok(manifest)
}

async fn create_root(dest_root: &Path) -> Result<()> {
    if let Some(parent) = dest_root.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| DeployError::TemplateWrite {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    fs::create_dir(dest_root).await.map_err(|source| {
        if source.kind() == io::ErrorKind::AlreadyExists {
            DeployError::DestinationExists {
                path: dest_root.to_path_buf(),
            }
        } else {
            DeployError::TemplateWrite {
                path: dest_root.to_path_buf(),
                source,
            }
        }
    })
}

async fn write_entry(
    dest_root: &Path,
    templates: &TemplateSet,
    entry: &TemplateEntry,
    substitutions: &Substitutions,
) -> Result<ManifestEntry> {
    let content = templates.read(entry).await?;
    let destination = dest_root.join(&entry.dest);
    let binary = is_binary(&content);

    let (bytes, applied, unresolved) = if binary {
        (content, Default::default(), Vec::new())
    } else {
        let text = String::from_utf8(content)
            .map_err(|e| DeployError::template_read(entry.source.clone(), e))?;
        let rendered = render(&text, substitutions, Escape::for_destination(&entry.dest));
        (
            rendered.text.into_bytes(),
            rendered.applied,
            rendered.unresolved.into_iter().collect(),
        )
    };

    let executable = entry.executable
        || bytes.starts_with(b"#!")
        || templates.source_is_executable(entry).await;

    fs::write(&destination, &bytes)
        .await
        .map_err(|source| DeployError::TemplateWrite {
            path: destination.clone(),
            source,
        })?;

    if executable {
        set_executable(&destination)
            .await
            .map_err(|source| DeployError::TemplateWrite {
                path: destination.clone(),
                source,
            })?;
    }

    tracing::debug!(source = %entry.source, dest = %destination.display(), binary, "wrote file");

    Ok(ManifestEntry {
        source: entry.source.clone(),
        destination,
        substitutions: applied,
        unresolved,
        binary,
        executable,
    })
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path).await?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions).await
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

//! Project naming and destination layout

use crate::build::BuildArtifact;
use crate::platform::Platform;
use std::path::{Path, PathBuf};

/// Suffix appended to the app name to form the project directory
pub const PROJECT_SUFFIX: &str = "-Automation";

/// Name used for the project directory and the `app_name` substitution
///
/// Order: explicit override, the source tree's project name, the artifact's
/// bundle name, then the source path's file stem.
pub fn resolve_app_name(
    app_name: Option<&str>,
    platform: Platform,
    source: &Path,
    artifact: &BuildArtifact,
) -> String {
    if let Some(name) = app_name {
        return name.to_string();
    }

    platform
        .project_name(source)
        .or_else(|| artifact.stem())
        .or_else(|| source_stem(source))
        .unwrap_or_else(|| "App".to_string())
}

/// `Foo.app-project` -> `Foo`
fn source_stem(source: &Path) -> Option<String> {
    let name = source.file_name()?.to_string_lossy();
    let stem = name.split('.').next().unwrap_or(&name);
    (!stem.is_empty()).then(|| stem.to_string())
}

/// `{output_dir or source parent}/{app_name}-Automation`
pub fn destination_root(source: &Path, output_dir: Option<&Path>, app_name: &str) -> PathBuf {
    let base = output_dir
        .map(Path::to_path_buf)
        .or_else(|| source.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(format!("{}{}", app_name, PROJECT_SUFFIX))
}

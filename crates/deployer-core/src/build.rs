//! Application build invocation and artifact resolution

use crate::error::{DeployError, Result};
use crate::platform::Platform;
use crate::process::{CommandRunner, ProcessError};
use crate::settings::DeploySettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the artifact came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    BuiltThisRun,
    PreExisting,
}

/// A compiled application bundle ready for metadata extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub path: PathBuf,
    pub provenance: Provenance,
    pub platform: Platform,
}

impl BuildArtifact {
    /// Only constructible for paths that exist and match the platform's artifact shape
    pub fn new(path: PathBuf, provenance: Provenance, platform: Platform) -> Option<Self> {
        platform.is_artifact(&path).then_some(Self {
            path,
            provenance,
            platform,
        })
    }

    /// Bundle name without extension (`Foo.app` -> `Foo`)
    pub fn stem(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
    }
}

/// Drives the platform build toolchain
pub struct AppBuilder<'a> {
    runner: &'a dyn CommandRunner,
    platform: Platform,
    settings: &'a DeploySettings,
    verbose: bool,
}

impl<'a> AppBuilder<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        platform: Platform,
        settings: &'a DeploySettings,
        verbose: bool,
    ) -> Self {
        Self {
            runner,
            platform,
            settings,
            verbose,
        }
    }

    /// Produce an artifact for `source`, building it unless `skip` is set
    pub async fn build(&self, source: &Path, skip: bool) -> Result<BuildArtifact> {
        if skip {
            self.resolve_existing(source)
        } else {
            self.run_build(source).await
        }
    }

    fn resolve_existing(&self, source: &Path) -> Result<BuildArtifact> {
        tracing::info!("Skipping build, looking for an existing artifact");

        if let Some(artifact) =
            BuildArtifact::new(source.to_path_buf(), Provenance::PreExisting, self.platform)
        {
            return Ok(artifact);
        }

        self.platform
            .locate_artifact(source)
            .and_then(|path| BuildArtifact::new(path, Provenance::PreExisting, self.platform))
            .ok_or_else(|| DeployError::ArtifactNotFound {
                searched: source.to_path_buf(),
            })
    }

    async fn run_build(&self, source: &Path) -> Result<BuildArtifact> {
        let invocation = self
            .platform
            .build_invocation(source, self.settings.build_timeout)?
            .streaming(self.verbose)
            .tail_lines(self.settings.tail_lines);

        tracing::info!(command = %invocation.command_line(), "building {} app", self.platform);

        let output = self.runner.run(&invocation).await.map_err(|e| match e {
            ProcessError::TimedOut { timeout, tail, .. } => DeployError::BuildTimedOut {
                secs: timeout.as_secs(),
                tail,
            },
            ProcessError::NotFound { program } => DeployError::Process {
                message: "executable not found".to_string(),
                program,
            },
            ProcessError::Io { program, message } => DeployError::Process { program, message },
        })?;

        if !output.success() {
            return Err(DeployError::BuildFailed {
                code: output.code,
                tail: output.tail,
            });
        }

        let output_dir = self.platform.build_output_dir(source);
        self.platform
            .locate_artifact(&output_dir)
            .and_then(|path| BuildArtifact::new(path, Provenance::BuiltThisRun, self.platform))
            .ok_or(DeployError::BuildArtifactMissing {
                searched: output_dir,
            })
    }
}

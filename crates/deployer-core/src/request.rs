//! Validated user intent for one deployment run

use crate::error::{DeployError, Result};
use crate::platform::Platform;
use std::path::{Path, PathBuf};

/// Everything the user asked for, checked once up front and immutable after
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    source: PathBuf,
    output_dir: Option<PathBuf>,
    app_name: Option<String>,
    platform: Platform,
    skip_build: bool,
    skip_venv: bool,
    verbose: bool,
}

impl DeploymentRequest {
    /// Start a request for the app at `source`
    pub fn builder(source: impl Into<PathBuf>) -> DeploymentRequestBuilder {
        DeploymentRequestBuilder {
            source: source.into(),
            output_dir: None,
            app_name: None,
            platform: Platform::default(),
            skip_build: false,
            skip_venv: false,
            verbose: false,
        }
    }

    /// Absolute path of the app source (project tree or prebuilt artifact)
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn skip_build(&self) -> bool {
        self.skip_build
    }

    pub fn skip_venv(&self) -> bool {
        self.skip_venv
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

/// Builder for [`DeploymentRequest`]
#[derive(Debug, Clone)]
pub struct DeploymentRequestBuilder {
    source: PathBuf,
    output_dir: Option<PathBuf>,
    app_name: Option<String>,
    platform: Platform,
    skip_build: bool,
    skip_venv: bool,
    verbose: bool,
}

impl DeploymentRequestBuilder {
    pub fn output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn app_name(mut self, name: Option<String>) -> Self {
        self.app_name = name;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn skip_build(mut self, skip: bool) -> Self {
        self.skip_build = skip;
        self
    }

    pub fn skip_venv(mut self, skip: bool) -> Self {
        self.skip_venv = skip;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check the source path, app name and platform
    pub fn build(self) -> Result<DeploymentRequest> {
        self.platform.ensure_supported()?;

        let missing = || DeployError::AppPathMissing {
            path: self.source.clone(),
        };
        let source = std::path::absolute(&self.source).map_err(|_| missing())?;
        if !is_readable(&source) {
            return Err(missing());
        }

        let app_name = self
            .app_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if let Some(name) = &app_name {
            if !is_single_component(name) {
                return Err(DeployError::InvalidAppName { name: name.clone() });
            }
        }

        let output_dir = match self.output_dir {
            Some(dir) => Some(std::path::absolute(&dir).unwrap_or(dir)),
            None => None,
        };

        Ok(DeploymentRequest {
            source,
            output_dir,
            app_name,
            platform: self.platform,
            skip_build: self.skip_build,
            skip_venv: self.skip_venv,
            verbose: self.verbose,
        })
    }
}

fn is_readable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::read_dir(path).is_ok(),
        Ok(_) => std::fs::File::open(path).is_ok(),
        Err(_) => false,
    }
}

fn is_single_component(name: &str) -> bool {
    name != "." && name != ".." && !name.contains(['/', '\\'])
}

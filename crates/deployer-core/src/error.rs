//! Error types for the deployment pipeline
//!
//! Every error kind belongs to exactly one pipeline stage. The pipeline driver
//! wraps failures in [`StageError`] so the user sees which stage failed.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the deployer's error type
pub type Result<T> = std::result::Result<T, DeployError>;

/// One of the four sequential pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Build,
    Extract,
    Materialize,
}

impl Stage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Build => "build",
            Stage::Extract => "extract",
            Stage::Materialize => "materialize",
        }
    }

    /// Process exit code reported when this stage fails
    pub fn exit_code(&self) -> i32 {
        match self {
            Stage::Validate => 2,
            Stage::Build => 3,
            Stage::Extract => 4,
            Stage::Materialize => 5,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Deployment error kinds
#[derive(Error, Debug)]
pub enum DeployError {
    /// Source app path is absent or unreadable
    #[error("App path does not exist or is not readable: {}", path.display())]
    AppPathMissing { path: PathBuf },

    /// App name override cannot be used as a directory name
    #[error("Invalid app name '{name}': must be a single path component")]
    InvalidAppName { name: String },

    /// Platform variant is reserved but not implemented
    #[error("Platform '{platform}' is not supported yet")]
    UnsupportedPlatform { platform: String },

    /// Required tool is not installed
    #[error("Required tool not found: {tool}{}", hint_suffix(hint))]
    MissingRequiredTool { tool: String, hint: Option<String> },

    /// Required tool is installed but too old
    #[error("{tool} {found} is installed but {required} or newer is required")]
    UnsupportedVersion {
        tool: String,
        found: String,
        required: String,
    },

    /// Version probe did not answer in time
    #[error("Timed out after {secs}s while querying {tool} for its version")]
    ToolTimedOut { tool: String, secs: u64 },

    /// No buildable project was found in the source tree
    #[error("No build project found in {}", path.display())]
    NoBuildProject { path: PathBuf },

    /// Build toolchain exited with a nonzero status
    #[error("Build failed with exit code {}{}", exit_code_label(*code), tail_suffix(tail))]
    BuildFailed { code: Option<i32>, tail: Vec<String> },

    /// Build toolchain did not finish in time
    #[error("Build timed out after {secs}s{}", tail_suffix(tail))]
    BuildTimedOut { secs: u64, tail: Vec<String> },

    /// Build reported success but produced nothing at the expected location
    #[error("Build succeeded but no artifact was produced under {}", searched.display())]
    BuildArtifactMissing { searched: PathBuf },

    /// Skip-build was requested but no pre-built artifact exists
    #[error("No pre-built artifact found under {}", searched.display())]
    ArtifactNotFound { searched: PathBuf },

    /// Subprocess could not be started or awaited
    #[error("Failed to run {program}: {message}")]
    Process { program: String, message: String },

    /// Artifact has no readable metadata manifest
    #[error("Malformed artifact {}: {reason}", path.display())]
    MalformedArtifact { path: PathBuf, reason: String },

    /// Metadata manifest lacks a required field
    #[error("Metadata manifest {} is missing required field '{field}'", path.display())]
    MissingMetadataField { field: String, path: PathBuf },

    /// Identifier does not follow the reverse-DNS grammar
    #[error("Invalid application identifier '{identifier}'")]
    InvalidIdentifier { identifier: String },

    /// Destination directory already exists
    #[error("Destination already exists: {} (delete it or choose another --output-dir)", path.display())]
    DestinationExists { path: PathBuf },

    /// Template set manifest is unreadable or inconsistent
    #[error("Invalid template set: {reason}")]
    InvalidTemplateSet { reason: String },

    /// Template destination would land outside the project root
    #[error("Template destination escapes the project root: {path}")]
    PathEscapes { path: String },

    /// Template source could not be read
    #[error("Failed to read template {path}: {message}")]
    TemplateRead { path: String, message: String },

    /// Generated file could not be written
    #[error("Failed to write {}: {source}", path.display())]
    TemplateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Project manifest could not be persisted
    #[error("Failed to write project manifest {}: {message}", path.display())]
    ManifestWrite { path: PathBuf, message: String },
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_ref()
        .map(|h| format!(" (install: {})", h))
        .unwrap_or_default()
}

fn exit_code_label(code: Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "unknown (terminated by signal)".to_string())
}

fn tail_suffix(tail: &[String]) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!("\nLast output lines:\n{}", tail.join("\n"))
    }
}

impl DeployError {
    /// Stage this error originates from
    pub fn stage(&self) -> Stage {
        match self {
            DeployError::AppPathMissing { .. }
            | DeployError::InvalidAppName { .. }
            | DeployError::UnsupportedPlatform { .. }
            | DeployError::MissingRequiredTool { .. }
            | DeployError::UnsupportedVersion { .. }
            | DeployError::ToolTimedOut { .. } => Stage::Validate,
            DeployError::NoBuildProject { .. }
            | DeployError::BuildFailed { .. }
            | DeployError::BuildTimedOut { .. }
            | DeployError::BuildArtifactMissing { .. }
            | DeployError::ArtifactNotFound { .. }
            | DeployError::Process { .. } => Stage::Build,
            DeployError::MalformedArtifact { .. }
            | DeployError::MissingMetadataField { .. }
            | DeployError::InvalidIdentifier { .. } => Stage::Extract,
            DeployError::DestinationExists { .. }
            | DeployError::InvalidTemplateSet { .. }
            | DeployError::PathEscapes { .. }
            | DeployError::TemplateRead { .. }
            | DeployError::TemplateWrite { .. }
            | DeployError::ManifestWrite { .. } => Stage::Materialize,
        }
    }

    /// Create a template read error
    pub fn template_read(path: impl Into<String>, message: impl ToString) -> Self {
        Self::TemplateRead {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an invalid template set error
    pub fn invalid_template_set(reason: impl Into<String>) -> Self {
        Self::InvalidTemplateSet {
            reason: reason.into(),
        }
    }

    /// Create a malformed artifact error
    pub fn malformed_artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A deployment failure tagged with the stage it happened in
#[derive(Error, Debug)]
#[error("{stage} stage failed: {error}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub error: DeployError,
}

impl StageError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        self.stage.exit_code()
    }
}

impl From<DeployError> for StageError {
    fn from(error: DeployError) -> Self {
        Self {
            stage: error.stage(),
            error,
        }
    }
}

//! Application metadata recovered from a build artifact

use crate::build::BuildArtifact;
use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};

/// Identity of the application under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Reverse-DNS identifier (bundle id / package name)
    pub identifier: String,
    pub display_name: String,
    /// Minimum OS version the app declares, if any
    pub platform_version_floor: Option<String>,
}

impl AppMetadata {
    /// Validates `identifier` against the reverse-DNS grammar
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        platform_version_floor: Option<String>,
    ) -> Result<Self> {
        let identifier = identifier.into();
        if !is_valid_identifier(&identifier) {
            return Err(DeployError::InvalidIdentifier { identifier });
        }
        Ok(Self {
            identifier,
            display_name: display_name.into(),
            platform_version_floor,
        })
    }
}

/// At least two `.`-separated segments of ASCII alphanumerics and `-`
pub fn is_valid_identifier(identifier: &str) -> bool {
    let segments: Vec<&str> = identifier.split('.').collect();
    segments.len() >= 2
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Read metadata from the artifact's embedded manifest
///
/// The identifier always comes from the manifest; it is never inferred from
/// the artifact's file name.
pub fn extract(artifact: &BuildArtifact) -> Result<AppMetadata> {
    let metadata = artifact.platform.read_metadata(&artifact.path)?;
    tracing::info!(
        identifier = %metadata.identifier,
        display_name = %metadata.display_name,
        "extracted app metadata"
    );
    Ok(metadata)
}

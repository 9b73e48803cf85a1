//! Target platform variants
//!
//! The variant set is closed: each platform supplies its tool set, build
//! invocation, artifact predicate and metadata reader. The variant is chosen
//! once when the deployment request is constructed.

pub mod ios;

use crate::error::{DeployError, Result};
use crate::metadata::AppMetadata;
use crate::process::{CommandRunner, Invocation};
use crate::runtime::ToolSpec;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Supported mobile platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    #[default]
    Ios,
    /// Reserved; requests for it are rejected
    Android,
}

impl Platform {
    /// Internal name, also the template directory name
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Ios => "iOS",
            Platform::Android => "Android",
        }
    }

    /// Appium automation driver used by generated capabilities
    pub fn automation_name(&self) -> &'static str {
        match self {
            Platform::Ios => "XCUITest",
            Platform::Android => "UiAutomator2",
        }
    }

    /// File extension of installable artifacts
    pub fn artifact_extension(&self) -> &'static str {
        match self {
            Platform::Ios => "app",
            Platform::Android => "apk",
        }
    }

    pub fn is_implemented(&self) -> bool {
        matches!(self, Platform::Ios)
    }

    pub fn ensure_supported(&self) -> Result<()> {
        if self.is_implemented() {
            Ok(())
        } else {
            Err(self.unsupported())
        }
    }

    fn unsupported(&self) -> DeployError {
        DeployError::UnsupportedPlatform {
            platform: self.name().to_string(),
        }
    }

    /// Tools the validator checks for this platform
    pub fn required_tools(&self) -> &'static [ToolSpec] {
        match self {
            Platform::Ios => ios::TOOLS,
            Platform::Android => &[],
        }
    }

    /// Whether `path` is an artifact of this platform
    pub fn is_artifact(&self, path: &Path) -> bool {
        match self {
            Platform::Ios => ios::is_app_bundle(path),
            Platform::Android => {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(self.artifact_extension())
            }
        }
    }

    /// Scan `root` for a build output artifact
    pub fn locate_artifact(&self, root: &Path) -> Option<PathBuf> {
        match self {
            Platform::Ios => ios::locate_app_bundle(root),
            Platform::Android => None,
        }
    }

    /// Where the build toolchain writes its output for `source`
    pub fn build_output_dir(&self, source: &Path) -> PathBuf {
        match self {
            Platform::Ios => ios::derived_data_dir(source),
            Platform::Android => source.join("app").join("build").join("outputs"),
        }
    }

    /// Build toolchain invocation for the project in `source`
    pub fn build_invocation(&self, source: &Path, timeout: Duration) -> Result<Invocation> {
        match self {
            Platform::Ios => {
                let project = ios::find_xcodeproj(source)?;
                Ok(ios::build_invocation(source, &project, timeout))
            }
            Platform::Android => Err(self.unsupported()),
        }
    }

    /// Read identifier and display name from the artifact's embedded manifest
    pub fn read_metadata(&self, artifact: &Path) -> Result<AppMetadata> {
        match self {
            Platform::Ios => ios::read_info_plist(artifact),
            Platform::Android => Err(self.unsupported()),
        }
    }

    /// Project name declared by the source tree, if any
    pub fn project_name(&self, source: &Path) -> Option<String> {
        match self {
            Platform::Ios => ios::find_xcodeproj(source)
                .ok()
                .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned())),
            Platform::Android => None,
        }
    }

    /// Default device/simulator profile for generated capabilities
    pub async fn device_profile(&self, runner: &dyn CommandRunner, timeout: Duration) -> DeviceProfile {
        match self {
            Platform::Ios => ios::detect_simulator(runner, timeout).await,
            Platform::Android => DeviceProfile {
                device_name: "Android Emulator".to_string(),
                platform_version: "14.0".to_string(),
                udid: "auto".to_string(),
            },
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            other => Err(format!("unknown platform '{}' (expected ios or android)", other)),
        }
    }
}

/// Device the generated capabilities target by default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub device_name: String,
    pub platform_version: String,
    pub udid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platform() {
        assert_eq!("iOS".parse::<Platform>(), Ok(Platform::Ios));
        assert_eq!("android".parse::<Platform>(), Ok(Platform::Android));
        assert!("windows".parse::<Platform>().is_err());
    }

    #[test]
    fn test_android_is_reserved() {
        assert!(Platform::Ios.ensure_supported().is_ok());
        assert!(matches!(
            Platform::Android.ensure_supported(),
            Err(DeployError::UnsupportedPlatform { .. })
        ));
    }
}

//! iOS: xcodebuild, `.app` bundles, Info.plist, simulators

use super::DeviceProfile;
use crate::error::{DeployError, Result};
use crate::metadata::AppMetadata;
use crate::process::{CommandRunner, Invocation};
use crate::runtime::version::parse_version;
use crate::runtime::ToolSpec;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// iOS prerequisites
pub const TOOLS: &[ToolSpec] = &[
    ToolSpec::required("python3", "python3", &["--version"])
        .min_version("3.8.0")
        .install_hint("https://python.org"),
    ToolSpec::required("xcodebuild", "xcodebuild", &["-version"])
        .min_version("14.0.0")
        .install_hint("install Xcode from the App Store, then xcode-select --install"),
    ToolSpec::required("xcrun", "xcrun", &["--version"]).install_hint("xcode-select --install"),
    ToolSpec::optional("appium", "appium", &["--version"])
        .min_version("2.0.0")
        .install_hint("npm install -g appium"),
    ToolSpec::optional("xcuitest-driver", "appium", &["driver", "list", "--installed"])
        .expect_output("xcuitest")
        .install_hint("appium driver install xcuitest"),
];

/// Build products directory for simulator debug builds
const PRODUCTS_DIR: &str = "Debug-iphonesimulator";

const FALLBACK_DEVICE: &str = "iPhone 15";
const FALLBACK_VERSION: &str = "17.0";

/// First `*.xcodeproj` directly inside `source`, in name order
pub fn find_xcodeproj(source: &Path) -> Result<PathBuf> {
    let no_project = || DeployError::NoBuildProject {
        path: source.to_path_buf(),
    };

    let mut projects: Vec<PathBuf> = std::fs::read_dir(source)
        .map_err(|_| no_project())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("xcodeproj"))
        .collect();
    projects.sort();

    if projects.len() > 1 {
        tracing::warn!(
            "Multiple .xcodeproj files found, using {}",
            projects[0].display()
        );
    }

    projects.into_iter().next().ok_or_else(no_project)
}

/// Derived data location passed to xcodebuild
pub fn derived_data_dir(source: &Path) -> PathBuf {
    source.join("build")
}

/// `xcodebuild` simulator debug build of the scheme named after the project
pub fn build_invocation(source: &Path, project: &Path, timeout: Duration) -> Invocation {
    let scheme = project
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Invocation::new(
        "xcodebuild",
        [
            "-project".to_string(),
            project.display().to_string(),
            "-scheme".to_string(),
            scheme,
            "-sdk".to_string(),
            "iphonesimulator".to_string(),
            "-configuration".to_string(),
            "Debug".to_string(),
            "-derivedDataPath".to_string(),
            derived_data_dir(source).display().to_string(),
            "build".to_string(),
        ],
        timeout,
    )
    .current_dir(source)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

pub fn is_app_bundle(path: &Path) -> bool {
    path.is_dir() && has_extension(path, "app")
}

/// `.../Build/Products/Debug-iphonesimulator/<Name>.app`
fn is_simulator_product(path: &Path) -> bool {
    let names: Vec<_> = path
        .ancestors()
        .skip(1)
        .take(3)
        .map(|p| p.file_name().and_then(|n| n.to_str()).unwrap_or_default())
        .collect();
    names == [PRODUCTS_DIR, "Products", "Build"]
}

/// First simulator `.app` bundle beneath `root`, in name order
pub fn locate_app_bundle(root: &Path) -> Option<PathBuf> {
    let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        if entry.depth() > 0 && entry.file_name() == ".git" {
            walker.skip_current_dir();
            continue;
        }
        if has_extension(path, "app") {
            if is_simulator_product(path) {
                return Some(entry.into_path());
            }
            walker.skip_current_dir();
        }
    }
    None
}

/// Read bundle identifier, display name and minimum OS from `Info.plist`
pub fn read_info_plist(artifact: &Path) -> Result<AppMetadata> {
    let plist_path = artifact.join("Info.plist");
    if !plist_path.is_file() {
        return Err(DeployError::malformed_artifact(artifact, "Info.plist not found"));
    }

    let value = plist::Value::from_file(&plist_path).map_err(|e| {
        DeployError::malformed_artifact(artifact, format!("unreadable Info.plist: {}", e))
    })?;
    let dict = value.as_dictionary().ok_or_else(|| {
        DeployError::malformed_artifact(artifact, "Info.plist root is not a dictionary")
    })?;

    let field = |key: &str| {
        dict.get(key)
            .and_then(|v| v.as_string())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let missing = |key: &str| DeployError::MissingMetadataField {
        field: key.to_string(),
        path: plist_path.clone(),
    };

    let identifier = field("CFBundleIdentifier").ok_or_else(|| missing("CFBundleIdentifier"))?;
    let display_name = field("CFBundleDisplayName")
        .or_else(|| field("CFBundleName"))
        .ok_or_else(|| missing("CFBundleName"))?;

    AppMetadata::new(identifier, display_name, field("MinimumOSVersion"))
}

#[derive(Debug, Deserialize)]
struct SimctlList {
    devices: HashMap<String, Vec<SimDevice>>,
}

#[derive(Debug, Deserialize)]
struct SimDevice {
    name: String,
    udid: String,
    #[serde(rename = "isAvailable", default = "available_by_default")]
    is_available: bool,
}

fn available_by_default() -> bool {
    true
}

/// `com.apple.CoreSimulator.SimRuntime.iOS-17-2` -> `17.2`
fn runtime_version(runtime: &str) -> Option<String> {
    let last = runtime.rsplit('.').next()?;
    let version = last.strip_prefix("iOS-")?;
    Some(version.replace('-', "."))
}

/// First available iPhone on the newest iOS runtime in `simctl` JSON output
fn parse_simctl(json: &str) -> Option<DeviceProfile> {
    let list: SimctlList = serde_json::from_str(json).ok()?;

    let mut runtimes: Vec<(String, &Vec<SimDevice>)> = list
        .devices
        .iter()
        .filter_map(|(runtime, devices)| runtime_version(runtime).map(|v| (v, devices)))
        .collect();
    runtimes.sort_by(|a, b| parse_version(&b.0).cmp(&parse_version(&a.0)));

    runtimes.into_iter().find_map(|(version, devices)| {
        devices
            .iter()
            .find(|d| d.is_available && d.name.contains("iPhone"))
            .map(|d| DeviceProfile {
                device_name: d.name.clone(),
                platform_version: version.clone(),
                udid: d.udid.clone(),
            })
    })
}

fn fallback_profile() -> DeviceProfile {
    DeviceProfile {
        device_name: FALLBACK_DEVICE.to_string(),
        platform_version: FALLBACK_VERSION.to_string(),
        udid: "auto".to_string(),
    }
}

/// Pick a default simulator; any failure falls back to a fixed profile
pub async fn detect_simulator(runner: &dyn CommandRunner, timeout: Duration) -> DeviceProfile {
    let invocation = Invocation::new("xcrun", ["simctl", "list", "devices", "available", "-j"], timeout);
    match runner.run(&invocation).await {
        Ok(output) if output.success() => parse_simctl(&output.stdout).unwrap_or_else(|| {
            tracing::warn!("No iPhone simulator found, using {}", FALLBACK_DEVICE);
            fallback_profile()
        }),
        Ok(output) => {
            tracing::warn!(code = ?output.code, "simctl query failed, using default simulator profile");
            fallback_profile()
        }
        Err(e) => {
            tracing::warn!("simctl query failed ({}), using default simulator profile", e);
            fallback_profile()
        }
    }
}

//! End-to-end deployments against a scripted host toolchain

use async_trait::async_trait;
use deployer_core::error::{DeployError, Stage};
use deployer_core::pipeline::{Deployer, LogReporter};
use deployer_core::process::{CommandRunner, Invocation, ProcessError, ProcessOutput};
use deployer_core::{DeploySettings, DeploymentRequest, ProjectManifest};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use walkdir::WalkDir;

const PRODUCT_DIR: &str = "build/Build/Products/Debug-iphonesimulator";

const SIMCTL_JSON: &str = r#"{
  "devices": {
    "com.apple.CoreSimulator.SimRuntime.iOS-16-4": [
      {"name": "iPhone 14", "udid": "OLD-UDID", "isAvailable": true}
    ],
    "com.apple.CoreSimulator.SimRuntime.iOS-17-2": [
      {"name": "iPad Air", "udid": "IPAD-UDID", "isAvailable": true},
      {"name": "iPhone 15 Pro", "udid": "NEW-UDID", "isAvailable": true}
    ]
  }
}"#;

fn info_plist(identifier: &str, name: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <plist version=\"1.0\">\n<dict>\n\
         \x20 <key>CFBundleIdentifier</key>\n  <string>{}</string>\n\
         \x20 <key>CFBundleName</key>\n  <string>{}</string>\n\
         \x20 <key>MinimumOSVersion</key>\n  <string>16.0</string>\n\
         </dict>\n</plist>\n",
        identifier, name
    )
}

fn write_bundle(bundle: &Path, identifier: &str, name: &str) {
    fs::create_dir_all(bundle).unwrap();
    fs::write(bundle.join("Info.plist"), info_plist(identifier, name)).unwrap();
}

/// Answers like a macOS host with Xcode, Python and Appium installed
struct ScriptedHost {
    missing: HashSet<&'static str>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedHost {
    fn new() -> Self {
        Self {
            missing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn without(tools: &[&'static str]) -> Self {
        Self {
            missing: tools.iter().copied().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn ran(&self, program: &str, arg: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.program.ends_with(program) && c.args.iter().any(|a| a == arg))
    }
}

fn stdout(text: &str) -> Result<ProcessOutput, ProcessError> {
    Ok(ProcessOutput {
        code: Some(0),
        stdout: text.to_string(),
        ..Default::default()
    })
}

#[async_trait]
impl CommandRunner for ScriptedHost {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        self.calls.lock().unwrap().push(invocation.clone());

        let program = Path::new(&invocation.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if self.missing.contains(program.as_str()) {
            return Err(ProcessError::NotFound { program });
        }

        let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
        match (program.as_str(), args.as_slice()) {
            ("python3", ["--version"]) => stdout("Python 3.11.4"),
            ("xcodebuild", ["-version"]) => stdout("Xcode 15.2\nBuild version 15C500b"),
            ("xcodebuild", [.., "build"]) => {
                let cwd = invocation.cwd.clone().unwrap_or_default();
                write_bundle(&cwd.join(PRODUCT_DIR).join("Foo.app"), "com.acme.foo", "Foo");
                stdout("** BUILD SUCCEEDED **")
            }
            ("xcrun", ["--version"]) => stdout("xcrun version 70."),
            ("xcrun", ["simctl", ..]) => stdout(SIMCTL_JSON),
            ("appium", ["--version"]) => stdout("2.5.1"),
            ("appium", ["driver", ..]) => stdout("- xcuitest@5.12.0 [installed (npm)]"),
            ("python3", ["-m", "venv", ..]) | ("pip", _) => stdout(""),
            _ => Ok(ProcessOutput {
                code: Some(127),
                ..Default::default()
            }),
        }
    }
}

fn settings() -> DeploySettings {
    DeploySettings::default()
}

/// `work/Foo` with an Xcode project, plus an empty `out` directory
fn workspace() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("work").join("Foo");
    fs::create_dir_all(source.join("Foo.xcodeproj")).unwrap();
    let out = dir.path().join("out");
    (dir, source, out)
}

fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
        .collect()
}

fn capabilities(root: &Path) -> serde_json::Value {
    let content = fs::read_to_string(root.join("config/ios/capabilities.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn missing_required_tool_aborts_before_build() {
    let (_dir, source, out) = workspace();
    let host = ScriptedHost::without(&["xcodebuild"]);
    let request = DeploymentRequest::builder(&source)
        .output_dir(Some(out.clone()))
        .build()
        .unwrap();

    let err = Deployer::new(&host, &LogReporter, &settings())
        .deploy(&request)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Validate);
    assert_eq!(err.exit_code(), 2);
    assert!(matches!(err.error, DeployError::MissingRequiredTool { ref tool, .. } if tool == "xcodebuild"));
    assert!(!host.ran("xcodebuild", "build"));
    assert!(!out.exists());
}

#[tokio::test]
async fn builds_and_materializes_project() {
    let (_dir, source, out) = workspace();
    let host = ScriptedHost::new();
    let request = DeploymentRequest::builder(&source)
        .output_dir(Some(out.clone()))
        .build()
        .unwrap();

    let report = Deployer::new(&host, &LogReporter, &settings())
        .deploy(&request)
        .await
        .unwrap();

    let root = out.join("Foo-Automation");
    assert_eq!(report.destination, root);
    assert_eq!(report.metadata.identifier, "com.acme.foo");
    assert_eq!(report.device.device_name, "iPhone 15 Pro");
    assert!(report.unresolved.is_empty());
    assert!(report.venv_ready);
    assert!(host.ran("python3", "venv"));
    assert!(host.ran("pip", "requirements.txt"));

    let manifest = ProjectManifest::load(&root).await.unwrap();
    assert_eq!(manifest.entries.len(), report.files_written);
    assert_eq!(manifest.header.platform, "ios");
    for entry in &manifest.entries {
        assert!(entry.destination.starts_with(&root), "{:?}", entry.destination);
        assert!(entry.destination.is_file(), "{:?}", entry.destination);
    }

    let caps = capabilities(&root);
    assert_eq!(caps["simulator"]["appium:bundleId"], "com.acme.foo");
    assert_eq!(caps["simulator"]["appium:platformVersion"], "17.2");
    assert_eq!(caps["simulator"]["appium:udid"], "NEW-UDID");
    assert_eq!(
        caps["simulator"]["appium:app"],
        source.join(PRODUCT_DIR).join("Foo.app").display().to_string()
    );

    let readme = fs::read_to_string(root.join("README.md")).unwrap();
    assert!(readme.starts_with("# Foo-Automation"));
    assert!(!readme.contains("{{"));
    assert!(root.join("reports/android").is_dir());
    assert!(root.join("tests/ios/__init__.py").is_file());
}

#[tokio::test]
async fn every_device_profile_names_app_and_target() {
    let (_dir, source, out) = workspace();
    let host = ScriptedHost::new();
    let request = DeploymentRequest::builder(&source)
        .output_dir(Some(out))
        .skip_venv(true)
        .build()
        .unwrap();

    let report = Deployer::new(&host, &LogReporter, &settings())
        .deploy(&request)
        .await
        .unwrap();

    let caps = capabilities(&report.destination);
    let profiles = caps.as_object().unwrap();
    assert!(!profiles.is_empty());
    let app = source.join(PRODUCT_DIR).join("Foo.app").display().to_string();
    for (name, profile) in profiles {
        for key in [
            "platformName",
            "appium:platformVersion",
            "appium:deviceName",
            "appium:automationName",
            "appium:app",
            "appium:bundleId",
        ] {
            assert!(profile.get(key).is_some(), "{} profile has no {}", name, key);
        }
        assert_eq!(profile["appium:app"], app.as_str(), "{}", name);
        assert_eq!(profile["appium:bundleId"], "com.acme.foo", "{}", name);
    }
}

#[tokio::test]
async fn prebuilt_artifact_uses_plist_identifier() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("Foo.app-project");
    write_bundle(&source.join(PRODUCT_DIR).join("Foo.app"), "com.acme.foo", "Foo");
    let host = ScriptedHost::new();
    let request = DeploymentRequest::builder(&source)
        .skip_build(true)
        .skip_venv(true)
        .build()
        .unwrap();

    let report = Deployer::new(&host, &LogReporter, &settings())
        .deploy(&request)
        .await
        .unwrap();

    assert_eq!(report.destination, dir.path().join("Foo-Automation"));
    assert_eq!(capabilities(&report.destination)["simulator"]["appium:bundleId"], "com.acme.foo");
    assert!(!host.ran("xcodebuild", "build"));
}

#[tokio::test]
async fn second_run_refuses_existing_destination() {
    let (_dir, source, out) = workspace();
    let host = ScriptedHost::new();
    let request = DeploymentRequest::builder(&source)
        .output_dir(Some(out.clone()))
        .skip_venv(true)
        .build()
        .unwrap();
    let settings = settings();
    let deployer = Deployer::new(&host, &LogReporter, &settings);

    let first = deployer.deploy(&request).await.unwrap();
    let before = snapshot(&first.destination);

    let err = deployer.deploy(&request).await.unwrap_err();
    assert_eq!(err.stage, Stage::Materialize);
    assert_eq!(err.exit_code(), 5);
    assert!(matches!(err.error, DeployError::DestinationExists { .. }));
    assert_eq!(snapshot(&first.destination), before);
}

#[tokio::test]
async fn missing_prebuilt_artifact_creates_nothing() {
    let (_dir, source, out) = workspace();
    let host = ScriptedHost::new();
    let request = DeploymentRequest::builder(&source)
        .output_dir(Some(out.clone()))
        .skip_build(true)
        .build()
        .unwrap();

    let err = Deployer::new(&host, &LogReporter, &settings())
        .deploy(&request)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Build);
    assert!(matches!(err.error, DeployError::ArtifactNotFound { .. }));
    assert!(!out.exists());
}

#[tokio::test]
async fn unknown_placeholder_is_left_visible() {
    let (dir, source, out) = workspace();
    let templates = dir.path().join("templates");
    fs::create_dir_all(templates.join("ios")).unwrap();
    fs::write(templates.join("template.yaml"), "templates: [ios]\n").unwrap();
    fs::write(
        templates.join("ios/template.yaml"),
        "name: iOS\ndescription: d\nversion: 0.1.0\nfiles:\n  - source: notes.md\n",
    )
    .unwrap();
    fs::write(templates.join("ios/notes.md"), "{{app_name}} uses {{unknown_key}}\n").unwrap();

    let host = ScriptedHost::new();
    let settings = DeploySettings {
        template_dir: Some(templates),
        ..DeploySettings::default()
    };
    let request = DeploymentRequest::builder(&source)
        .output_dir(Some(out))
        .skip_venv(true)
        .build()
        .unwrap();

    let report = Deployer::new(&host, &LogReporter, &settings)
        .deploy(&request)
        .await
        .unwrap();

    let notes = fs::read_to_string(report.destination.join("notes.md")).unwrap();
    assert_eq!(notes, "Foo uses {{unknown_key}}\n");
    assert_eq!(
        report.unresolved,
        vec![(report.destination.join("notes.md"), "unknown_key".to_string())]
    );
    assert!(report.warnings.iter().any(|w| w.contains("unknown_key")));
}

#[tokio::test]
async fn skip_venv_runs_no_python_setup() {
    let (_dir, source, out) = workspace();
    let host = ScriptedHost::new();
    let request = DeploymentRequest::builder(&source)
        .output_dir(Some(out))
        .skip_venv(true)
        .build()
        .unwrap();

    let report = Deployer::new(&host, &LogReporter, &settings())
        .deploy(&request)
        .await
        .unwrap();

    assert!(!report.venv_ready);
    assert!(!host.ran("python3", "venv"));
    assert!(!report.destination.join("venv").exists());
}

#[tokio::test]
async fn missing_optional_tool_is_a_warning() {
    let (_dir, source, out) = workspace();
    let host = ScriptedHost::without(&["appium"]);
    let request = DeploymentRequest::builder(&source)
        .output_dir(Some(out))
        .skip_venv(true)
        .build()
        .unwrap();

    let report = Deployer::new(&host, &LogReporter, &settings())
        .deploy(&request)
        .await
        .unwrap();

    assert!(report.warnings.iter().any(|w| w.contains("appium")));
    assert!(report.destination.join("README.md").is_file());
}

#[tokio::test]
async fn app_name_override_names_directory_only() {
    let (_dir, source, out) = workspace();
    let host = ScriptedHost::new();
    let request = DeploymentRequest::builder(&source)
        .output_dir(Some(out.clone()))
        .app_name(Some("Shop".to_string()))
        .skip_venv(true)
        .build()
        .unwrap();

    let report = Deployer::new(&host, &LogReporter, &settings())
        .deploy(&request)
        .await
        .unwrap();

    assert_eq!(report.destination, out.join("Shop-Automation"));
    assert_eq!(report.metadata.display_name, "Foo");
    assert_eq!(capabilities(&report.destination)["simulator"]["appium:bundleId"], "com.acme.foo");
}

#[tokio::test]
async fn write_failure_leaves_partial_tree_without_manifest() {
    let (dir, source, out) = workspace();
    let templates = dir.path().join("templates");
    fs::create_dir_all(templates.join("ios")).unwrap();
    fs::write(templates.join("template.yaml"), "templates: [ios]\n").unwrap();
    fs::write(
        templates.join("ios/template.yaml"),
        "name: iOS\ndescription: d\nversion: 0.1.0\ndirectories:\n  - logs/x\nfiles:\n  - source: a.md\n  - source: b.md\n    dest: logs\n",
    )
    .unwrap();
    fs::write(templates.join("ios/a.md"), "{{app_name}}\n").unwrap();
    fs::write(templates.join("ios/b.md"), "clashes with a directory\n").unwrap();

    let host = ScriptedHost::new();
    let settings = DeploySettings {
        template_dir: Some(templates),
        ..DeploySettings::default()
    };
    let request = DeploymentRequest::builder(&source)
        .output_dir(Some(out.clone()))
        .skip_venv(true)
        .build()
        .unwrap();

    let err = Deployer::new(&host, &LogReporter, &settings)
        .deploy(&request)
        .await
        .unwrap_err();

    let root = out.join("Foo-Automation");
    assert_eq!(err.stage, Stage::Materialize);
    assert_eq!(err.exit_code(), 5);
    assert!(matches!(err.error, DeployError::TemplateWrite { ref path, .. } if *path == root.join("logs")));
    assert_eq!(fs::read_to_string(root.join("a.md")).unwrap(), "Foo\n");
    assert!(root.join("logs/x").is_dir());
    assert!(!root.join(".deploy-manifest.json").exists());
}

#[tokio::test]
async fn broken_template_dir_fails_before_build() {
    let (dir, source, out) = workspace();
    let host = ScriptedHost::new();
    let settings = DeploySettings {
        template_dir: Some(dir.path().join("no-such-templates")),
        ..DeploySettings::default()
    };
    let request = DeploymentRequest::builder(&source)
        .output_dir(Some(out.clone()))
        .build()
        .unwrap();

    let err = Deployer::new(&host, &LogReporter, &settings)
        .deploy(&request)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Materialize);
    assert_eq!(err.exit_code(), 5);
    assert!(matches!(err.error, DeployError::TemplateRead { .. }));
    assert!(!host.ran("xcodebuild", "build"));
    assert!(!out.exists());
}

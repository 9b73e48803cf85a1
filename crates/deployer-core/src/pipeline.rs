//! Four-stage deployment driver: validate, build, extract, materialize
//!
//! Stages run strictly in order and the first failure aborts the run with a
//! [`StageError`] naming the stage. Nothing is written to the destination
//! before the materialize stage starts.

use crate::build::{AppBuilder, BuildArtifact, Provenance};
use crate::error::{DeployError, Stage, StageError};
use crate::metadata::{self, AppMetadata};
use crate::platform::{DeviceProfile, Platform};
use crate::process::CommandRunner;
use crate::project::{
    destination_root, materialize, resolve_app_name, setup_virtualenv, ManifestHeader,
    ProjectManifest,
};
use crate::request::DeploymentRequest;
use crate::runtime::{check_compatibility, EnvironmentValidator};
use crate::settings::DeploySettings;
use crate::templates::{Substitutions, TemplateSet, TemplateSource};
use crate::GENERATOR_VERSION;
use std::path::{Path, PathBuf};

/// Substitution keys understood by the built-in templates
pub mod keys {
    pub const APP_NAME: &str = "app_name";
    pub const APP_PATH: &str = "app_path";
    pub const BUNDLE_ID: &str = "bundle_id";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const PLATFORM: &str = "platform";
    pub const PLATFORM_VERSION: &str = "platform_version";
    pub const MIN_OS_VERSION: &str = "min_os_version";
    pub const DEVICE_NAME: &str = "device_name";
    pub const DEVICE_UDID: &str = "device_udid";
    pub const AUTOMATION_NAME: &str = "automation_name";
    pub const GENERATOR_VERSION: &str = "generator_version";
}

/// Receives progress from the pipeline
pub trait Reporter {
    fn stage(&self, stage: Stage);
    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// [`Reporter`] that only emits tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn stage(&self, stage: Stage) {
        tracing::info!(%stage, "stage started");
    }

    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn success(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// Outcome of a successful deployment
#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub destination: PathBuf,
    pub app_name: String,
    pub platform: Platform,
    pub metadata: AppMetadata,
    pub artifact: BuildArtifact,
    pub device: DeviceProfile,
    pub manifest_path: PathBuf,
    pub files_written: usize,
    /// `(file, key)` pairs left verbatim in the output
    pub unresolved: Vec<(PathBuf, String)>,
    pub venv_ready: bool,
    pub warnings: Vec<String>,
}

impl DeploymentReport {
    /// Commands the user runs next, in order
    pub fn next_steps(&self) -> Vec<String> {
        let mut steps = vec![format!("cd {}", self.destination.display())];
        if self.venv_ready {
            steps.push("source venv/bin/activate".to_string());
        } else {
            steps.push(
                "python3 -m venv venv && source venv/bin/activate && pip install -r requirements.txt"
                    .to_string(),
            );
        }
        steps.push(format!(
            "appium driver install {}",
            self.platform.automation_name().to_lowercase()
        ));
        steps.push("appium  # in a separate terminal".to_string());
        steps.push(format!(
            "Update locators in pages/{}/home_page.py (use Appium Inspector)",
            self.platform.name()
        ));
        steps.push(format!("pytest tests/{}/ -m smoke -v", self.platform.name()));
        steps
    }
}

/// Runs one deployment request through every stage
pub struct Deployer<'a> {
    runner: &'a dyn CommandRunner,
    reporter: &'a dyn Reporter,
    settings: &'a DeploySettings,
}

fn in_stage(stage: Stage) -> impl FnOnce(DeployError) -> StageError {
    move |error| StageError { stage, error }
}

impl<'a> Deployer<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        reporter: &'a dyn Reporter,
        settings: &'a DeploySettings,
    ) -> Self {
        Self {
            runner,
            reporter,
            settings,
        }
    }

    pub async fn deploy(&self, request: &DeploymentRequest) -> Result<DeploymentReport, StageError> {
        let mut warnings = Vec::new();

        self.reporter.stage(Stage::Validate);
        self.validate(request, &mut warnings)
            .await
            .map_err(in_stage(Stage::Validate))?;

        // Template errors are materialize failures, but are caught before building.
        let templates = self
            .load_templates(request.platform(), &mut warnings)
            .await
            .map_err(in_stage(Stage::Materialize))?;

        self.reporter.stage(Stage::Build);
        let artifact = AppBuilder::new(
            self.runner,
            request.platform(),
            self.settings,
            request.verbose(),
        )
        .build(request.source(), request.skip_build())
        .await
        .map_err(in_stage(Stage::Build))?;
        let origin = match artifact.provenance {
            Provenance::BuiltThisRun => "Built",
            Provenance::PreExisting => "Using existing",
        };
        self.reporter
            .success(&format!("{} {}", origin, artifact.path.display()));

        self.reporter.stage(Stage::Extract);
        let metadata = metadata::extract(&artifact).map_err(in_stage(Stage::Extract))?;
        self.reporter.success(&format!(
            "{} ({})",
            metadata.display_name, metadata.identifier
        ));

        self.reporter.stage(Stage::Materialize);
        let (mut report, manifest) = self
            .materialize(request, templates, artifact, metadata, &mut warnings)
            .await
            .map_err(in_stage(Stage::Materialize))?;
        self.reporter.success(&format!(
            "Wrote {} files to {}",
            manifest.entries.len(),
            report.destination.display()
        ));

        if request.skip_venv() {
            self.reporter.info("Skipping virtual environment setup");
        } else {
            self.reporter.info("Creating virtual environment");
            match setup_virtualenv(
                self.runner,
                &report.destination,
                self.settings.build_timeout,
                request.verbose(),
            )
            .await
            {
                Ok(()) => {
                    report.venv_ready = true;
                    self.reporter.success("Virtual environment ready");
                }
                Err(e) => {
                    let message = format!("Virtual environment setup failed: {:#}", e);
                    self.reporter.warning(&message);
                    warnings.push(message);
                }
            }
        }

        report.warnings = warnings;
        Ok(report)
    }

    async fn validate(
        &self,
        request: &DeploymentRequest,
        warnings: &mut Vec<String>,
    ) -> Result<(), DeployError> {
        let mut validator = EnvironmentValidator::new(self.runner, self.settings.probe_timeout);
        let result = validator.validate(request.platform().required_tools()).await;

        for check in &result.checks {
            if check.satisfied {
                self.reporter.success(&check.to_string());
            } else if check.required {
                self.reporter.error(&check.to_string());
            } else {
                let message = match &check.install_hint {
                    Some(hint) => format!("{} is optional but recommended: {}", check, hint),
                    None => format!("{} is optional but recommended", check),
                };
                self.reporter.warning(&message);
                warnings.push(message);
            }
        }

        let failure = result
            .failures()
            .find_map(|check| check.to_error(validator.probe_timeout()));
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn load_templates(
        &self,
        platform: Platform,
        warnings: &mut Vec<String>,
    ) -> Result<TemplateSet, DeployError> {
        let source = TemplateSource::from_dir(self.settings.template_dir.clone());
        self.reporter
            .info(&format!("Loading templates from {}", source.describe()));
        let templates = TemplateSet::load(source, platform.name()).await?;
        if let Some(warning) = check_compatibility(GENERATOR_VERSION, &templates.version) {
            self.reporter.warning(&warning);
            warnings.push(warning);
        }
        Ok(templates)
    }

    async fn materialize(
        &self,
        request: &DeploymentRequest,
        templates: TemplateSet,
        artifact: BuildArtifact,
        metadata: AppMetadata,
        warnings: &mut Vec<String>,
    ) -> Result<(DeploymentReport, ProjectManifest), DeployError> {
        let platform = request.platform();
        let app_name = resolve_app_name(request.app_name(), platform, request.source(), &artifact);
        let destination = destination_root(request.source(), request.output_dir(), &app_name);

        if destination.exists() {
            return Err(DeployError::DestinationExists { path: destination });
        }

        let device = platform
            .device_profile(self.runner, self.settings.probe_timeout)
            .await;
        self.reporter.info(&format!(
            "Targeting {} ({} {})",
            device.device_name,
            platform.display_name(),
            device.platform_version
        ));

        let substitutions = substitutions(&app_name, platform, &artifact, &metadata, &device);
        let header = ManifestHeader {
            generator_version: GENERATOR_VERSION.to_string(),
            platform: platform.name().to_string(),
            template_version: templates.version.clone(),
            app: metadata.clone(),
        };

        let manifest = materialize(&destination, &templates, &substitutions, header).await?;

        let unresolved: Vec<(PathBuf, String)> = manifest
            .unresolved()
            .map(|(path, key)| (path.to_path_buf(), key.to_string()))
            .collect();
        for (path, key) in &unresolved {
            let message = format!(
                "Unresolved placeholder {{{{{}}}}} in {}",
                key,
                relative_to(path, &destination).display()
            );
            self.reporter.warning(&message);
            warnings.push(message);
        }

        let report = DeploymentReport {
            manifest_path: destination.join(crate::project::MANIFEST_FILE),
            files_written: manifest.entries.len(),
            destination,
            app_name,
            platform,
            metadata,
            artifact,
            device,
            unresolved,
            venv_ready: false,
            warnings: Vec::new(),
        };
        Ok((report, manifest))
    }
}

fn relative_to<'p>(path: &'p Path, root: &Path) -> &'p Path {
    path.strip_prefix(root).unwrap_or(path)
}

/// Values substituted into every template of a run
pub fn substitutions(
    app_name: &str,
    platform: Platform,
    artifact: &BuildArtifact,
    metadata: &AppMetadata,
    device: &DeviceProfile,
) -> Substitutions {
    let min_os = metadata
        .platform_version_floor
        .clone()
        .unwrap_or_else(|| device.platform_version.clone());

    [
        (keys::APP_NAME, app_name.to_string()),
        (keys::APP_PATH, artifact.path.display().to_string()),
        (keys::BUNDLE_ID, metadata.identifier.clone()),
        (keys::DISPLAY_NAME, metadata.display_name.clone()),
        (keys::PLATFORM, platform.display_name().to_string()),
        (keys::PLATFORM_VERSION, device.platform_version.clone()),
        (keys::MIN_OS_VERSION, min_os),
        (keys::DEVICE_NAME, device.device_name.clone()),
        (keys::DEVICE_UDID, device.udid.clone()),
        (keys::AUTOMATION_NAME, platform.automation_name().to_string()),
        (keys::GENERATOR_VERSION, GENERATOR_VERSION.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, BuildArtifact) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Foo.app");
        fs::create_dir(&path).unwrap();
        let artifact = BuildArtifact::new(path, Provenance::PreExisting, Platform::Ios).unwrap();
        (dir, artifact)
    }

    fn device() -> DeviceProfile {
        DeviceProfile {
            device_name: "iPhone 15 Pro".to_string(),
            platform_version: "17.2".to_string(),
            udid: "ABCD-1234".to_string(),
        }
    }

    #[test]
    fn test_substitution_values() {
        let (_dir, artifact) = fixture();
        let metadata = AppMetadata::new("com.acme.foo", "Foo Shop", None).unwrap();
        let subs = substitutions("Foo", Platform::Ios, &artifact, &metadata, &device());

        assert_eq!(subs[keys::BUNDLE_ID], "com.acme.foo");
        assert_eq!(subs[keys::DISPLAY_NAME], "Foo Shop");
        assert_eq!(subs[keys::PLATFORM], "iOS");
        assert_eq!(subs[keys::AUTOMATION_NAME], "XCUITest");
        assert_eq!(subs[keys::MIN_OS_VERSION], "17.2");
        assert_eq!(subs[keys::APP_PATH], artifact.path.display().to_string());
        assert_eq!(subs.len(), 11);
    }

    #[test]
    fn test_min_os_prefers_declared_floor() {
        let (_dir, artifact) = fixture();
        let metadata = AppMetadata::new("com.acme.foo", "Foo", Some("15.0".to_string())).unwrap();
        let subs = substitutions("Foo", Platform::Ios, &artifact, &metadata, &device());
        assert_eq!(subs[keys::MIN_OS_VERSION], "15.0");
    }

    #[test]
    fn test_next_steps_follow_venv_state() {
        let (_dir, artifact) = fixture();
        let mut report = DeploymentReport {
            destination: PathBuf::from("/work/Foo-Automation"),
            app_name: "Foo".to_string(),
            platform: Platform::Ios,
            metadata: AppMetadata::new("com.acme.foo", "Foo", None).unwrap(),
            artifact,
            device: device(),
            manifest_path: PathBuf::from("/work/Foo-Automation/.deploy-manifest.json"),
            files_written: 3,
            unresolved: Vec::new(),
            venv_ready: true,
            warnings: Vec::new(),
        };

        let steps = report.next_steps();
        assert_eq!(steps[0], "cd /work/Foo-Automation");
        assert_eq!(steps[1], "source venv/bin/activate");
        assert!(steps.contains(&"appium driver install xcuitest".to_string()));
        assert_eq!(steps.last().map(String::as_str), Some("pytest tests/ios/ -m smoke -v"));

        report.venv_ready = false;
        assert!(report.next_steps()[1].starts_with("python3 -m venv venv"));
    }
}

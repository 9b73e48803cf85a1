//! Stage progress and summary rendering with cliclack

use crate::error::{Stage, StageError};
use crate::pipeline::{Deployer, DeploymentReport, Reporter};
use crate::process::SystemRunner;
use crate::request::DeploymentRequest;
use crate::settings::DeploySettings;
use colored::Colorize;

/// [`Reporter`] printing cliclack log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalReporter;

fn stage_title(stage: Stage) -> &'static str {
    match stage {
        Stage::Validate => "Checking prerequisites",
        Stage::Build => "Building app",
        Stage::Extract => "Reading app metadata",
        Stage::Materialize => "Creating automation project",
    }
}

impl Reporter for TerminalReporter {
    fn stage(&self, stage: Stage) {
        tracing::debug!(%stage, "stage started");
        let _ = cliclack::log::step(stage_title(stage).bold());
    }

    fn info(&self, message: &str) {
        let _ = cliclack::log::info(message);
    }

    fn success(&self, message: &str) {
        let _ = cliclack::log::success(message);
    }

    fn warning(&self, message: &str) {
        let _ = cliclack::log::warning(message);
    }

    fn error(&self, message: &str) {
        let _ = cliclack::log::error(message);
    }
}

/// Run a deployment with terminal output
pub async fn run(
    request: DeploymentRequest,
    settings: DeploySettings,
) -> Result<DeploymentReport, StageError> {
    let _ = cliclack::intro(format!(
        "Mobile Deploy {}",
        format!("({})", request.platform()).dimmed()
    ));

    let runner = SystemRunner::new();
    let reporter = TerminalReporter;
    let result = Deployer::new(&runner, &reporter, &settings)
        .deploy(&request)
        .await;

    match &result {
        Ok(report) => print_summary(report),
        Err(err) => {
            let _ = cliclack::log::error(format!("{}", err.error));
            let _ = cliclack::outro_cancel(format!(
                "{} stage failed (exit code {})",
                err.stage,
                err.exit_code()
            ));
        }
    }

    result
}

fn print_summary(report: &DeploymentReport) {
    let _ = cliclack::log::success(format!(
        "Automation project created at {}",
        report.destination.display().to_string().bold()
    ));

    if !report.unresolved.is_empty() {
        let _ = cliclack::log::remark(format!(
            "{} placeholder(s) left unresolved; see {}",
            report.unresolved.len(),
            report.manifest_path.display()
        ));
    }

    println!();
    println!("  {}", "Next steps".bold());
    println!();

    for (i, step) in report.next_steps().iter().enumerate() {
        println!("  {}.  {}", i + 1, step);
    }
    println!();

    let _ = cliclack::outro("See README.md in the project for details. Happy testing!");
}

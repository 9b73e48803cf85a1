//! Python virtual environment for a generated project

use crate::process::{CommandRunner, Invocation};
use anyhow::{bail, Result};
use std::path::Path;
use std::time::Duration;

/// Directory name of the environment inside the project root
pub const VENV_DIR: &str = "venv";

/// Create `<root>/venv` and install `requirements.txt` into it
pub async fn setup_virtualenv(
    runner: &dyn CommandRunner,
    root: &Path,
    timeout: Duration,
    verbose: bool,
) -> Result<()> {
    let create = Invocation::new("python3", ["-m", "venv", VENV_DIR], timeout).current_dir(root);
    run_step(runner, &create).await?;

    if !root.join("requirements.txt").is_file() {
        tracing::debug!("no requirements.txt, skipping dependency install");
        return Ok(());
    }

    let pip = root.join(VENV_DIR).join("bin").join("pip");
    let install = Invocation::new(
        pip.display().to_string(),
        ["install", "-r", "requirements.txt"],
        timeout,
    )
    .current_dir(root)
    .streaming(verbose);
    run_step(runner, &install).await
}

async fn run_step(runner: &dyn CommandRunner, invocation: &Invocation) -> Result<()> {
    tracing::debug!(command = %invocation.command_line(), "running");
    let output = runner.run(invocation).await?;
    if !output.success() {
        bail!(
            "`{}` exited with {}: {}",
            invocation.command_line(),
            output
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            output.tail.last().map(String::as_str).unwrap_or("no output")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessError, ProcessOutput};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Recorder {
        fail_program: Option<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for Recorder {
        async fn run(&self, invocation: &Invocation) -> std::result::Result<ProcessOutput, ProcessError> {
            self.calls.lock().unwrap().push(invocation.command_line());
            let failed = self
                .fail_program
                .is_some_and(|p| invocation.program.ends_with(p));
            Ok(ProcessOutput {
                code: Some(if failed { 1 } else { 0 }),
                tail: vec!["ERROR: No matching distribution".to_string()],
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_creates_env_then_installs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "pytest\n").unwrap();
        let runner = Recorder {
            fail_program: None,
            calls: Mutex::new(Vec::new()),
        };

        setup_virtualenv(&runner, dir.path(), Duration::from_secs(60), false)
            .await
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], "python3 -m venv venv");
        assert!(calls[1].ends_with("venv/bin/pip install -r requirements.txt"));
    }

    #[tokio::test]
    async fn test_pip_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "pytest\n").unwrap();
        let runner = Recorder {
            fail_program: Some("pip"),
            calls: Mutex::new(Vec::new()),
        };

        let err = setup_virtualenv(&runner, dir.path(), Duration::from_secs(60), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No matching distribution"));
    }
}

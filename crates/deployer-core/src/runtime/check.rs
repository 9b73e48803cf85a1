//! Prerequisite detection for external tools and SDKs

use super::version::{extract_version, parse_version};
use crate::error::DeployError;
use crate::process::{CommandRunner, Invocation, ProcessError};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Description of a tool the deployment depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Name used in reports and as the probe cache key
    pub name: &'static str,
    /// Executable to invoke
    pub program: &'static str,
    /// Arguments that make the executable print its version
    pub args: &'static [&'static str],
    /// Minimum acceptable version (`None` = any version)
    pub min_version: Option<&'static str>,
    /// Whether an unsatisfied check aborts the deployment
    pub required: bool,
    /// Case-insensitive marker the probe output must contain
    pub expect_output: Option<&'static str>,
    /// How to install the tool, shown in diagnostics
    pub install_hint: Option<&'static str>,
}

impl ToolSpec {
    pub const fn required(name: &'static str, program: &'static str, args: &'static [&'static str]) -> Self {
        Self {
            name,
            program,
            args,
            min_version: None,
            required: true,
            expect_output: None,
            install_hint: None,
        }
    }

    pub const fn optional(name: &'static str, program: &'static str, args: &'static [&'static str]) -> Self {
        Self {
            required: false,
            ..Self::required(name, program, args)
        }
    }

    pub const fn min_version(mut self, version: &'static str) -> Self {
        self.min_version = Some(version);
        self
    }

    pub const fn expect_output(mut self, marker: &'static str) -> Self {
        self.expect_output = Some(marker);
        self
    }

    pub const fn install_hint(mut self, hint: &'static str) -> Self {
        self.install_hint = Some(hint);
        self
    }
}

/// What a version probe found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Tool answered; holds its probe output
    Found(String),
    /// Executable missing or the probe exited nonzero
    Absent,
    /// Probe did not answer within the probe timeout
    TimedOut,
}

/// Outcome of checking one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCheck {
    pub name: String,
    pub required: bool,
    /// Minimum version constraint, rendered (`">= 3.8.0"`), if any
    pub constraint: Option<String>,
    /// Detected version, `None` when absent or unparseable
    pub found_version: Option<String>,
    pub probe: Probe,
    pub satisfied: bool,
    pub install_hint: Option<String>,
}

impl ToolCheck {
    /// Error describing why a required check failed
    pub fn to_error(&self, probe_timeout: Duration) -> Option<DeployError> {
        if self.satisfied {
            return None;
        }
        Some(match (&self.probe, &self.found_version, &self.constraint) {
            (Probe::TimedOut, _, _) => DeployError::ToolTimedOut {
                tool: self.name.clone(),
                secs: probe_timeout.as_secs(),
            },
            (Probe::Found(_), Some(found), Some(required)) => DeployError::UnsupportedVersion {
                tool: self.name.clone(),
                found: found.clone(),
                required: required.clone(),
            },
            (Probe::Found(_), None, Some(required)) => DeployError::UnsupportedVersion {
                tool: self.name.clone(),
                found: "unknown".to_string(),
                required: required.clone(),
            },
            _ => DeployError::MissingRequiredTool {
                tool: self.name.clone(),
                hint: self.install_hint.clone(),
            },
        })
    }
}

impl fmt::Display for ToolCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.probe, &self.found_version) {
            (Probe::Found(_), Some(v)) => write!(f, "{} ({})", self.name, v),
            (Probe::Found(_), None) => write!(f, "{} (installed)", self.name),
            (Probe::Absent, _) => write!(f, "{} (not installed)", self.name),
            (Probe::TimedOut, _) => write!(f, "{} (probe timed out)", self.name),
        }
    }
}

/// Result of validating a tool set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub checks: Vec<ToolCheck>,
}

impl ValidationResult {
    /// True when every required tool is satisfied
    pub fn passed(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Required tools that are not satisfied
    pub fn failures(&self) -> impl Iterator<Item = &ToolCheck> {
        self.checks.iter().filter(|c| c.required && !c.satisfied)
    }

    /// Optional tools that are not satisfied
    pub fn warnings(&self) -> impl Iterator<Item = &ToolCheck> {
        self.checks.iter().filter(|c| !c.required && !c.satisfied)
    }
}

/// Probes host tools, memoizing each probe by tool name
///
/// One validator lives for one pipeline invocation, so the cache never
/// outlives a deployment.
pub struct EnvironmentValidator<'a> {
    runner: &'a dyn CommandRunner,
    probe_timeout: Duration,
    cache: HashMap<&'static str, Probe>,
}

impl<'a> EnvironmentValidator<'a> {
    pub fn new(runner: &'a dyn CommandRunner, probe_timeout: Duration) -> Self {
        Self {
            runner,
            probe_timeout,
            cache: HashMap::new(),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Check every tool in `tools`; never aborts, the caller decides
    pub async fn validate(&mut self, tools: &[ToolSpec]) -> ValidationResult {
        let mut checks = Vec::with_capacity(tools.len());
        for spec in tools {
            let probe = self.probe(spec).await;
            checks.push(evaluate(spec, probe));
        }
        ValidationResult { checks }
    }

    async fn probe(&mut self, spec: &ToolSpec) -> Probe {
        if let Some(cached) = self.cache.get(spec.name) {
            tracing::debug!(tool = spec.name, "using cached probe");
            return cached.clone();
        }

        let invocation = Invocation::new(spec.program, spec.args.iter().copied(), self.probe_timeout);
        let probe = match self.runner.run(&invocation).await {
            Ok(output) if output.success() => Probe::Found(output.combined()),
            Ok(output) => {
                tracing::debug!(tool = spec.name, code = ?output.code, "probe exited nonzero");
                Probe::Absent
            }
            Err(ProcessError::TimedOut { .. }) => Probe::TimedOut,
            Err(e) => {
                tracing::debug!(tool = spec.name, "probe failed: {}", e);
                Probe::Absent
            }
        };

        self.cache.insert(spec.name, probe.clone());
        probe
    }
}

fn evaluate(spec: &ToolSpec, probe: Probe) -> ToolCheck {
    let floor = spec.min_version.and_then(parse_version);
    let constraint = floor.as_ref().map(|v| format!(">= {}", v));

    let (found_version, satisfied) = match &probe {
        Probe::Found(output) => {
            let detected = extract_version(output);
            let marker_ok = spec
                .expect_output
                .map(|m| output.to_lowercase().contains(&m.to_lowercase()))
                .unwrap_or(true);
            let version_ok = match (&floor, &detected) {
                (None, _) => true,
                (Some(floor), Some(found)) => found >= floor,
                (Some(_), None) => false,
            };
            (detected.map(|v| v.to_string()), marker_ok && version_ok)
        }
        Probe::Absent | Probe::TimedOut => (None, false),
    };

    ToolCheck {
        name: spec.name.to_string(),
        required: spec.required,
        constraint,
        found_version,
        probe,
        satisfied,
        install_hint: spec.install_hint.map(str::to_string),
    }
}

//! Deployment tunables with environment overrides

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable pointing at an on-disk template set
pub const TEMPLATE_DIR_ENV: &str = "MOBILE_DEPLOY_TEMPLATE_DIR";

/// Environment variable overriding the build timeout, in seconds
pub const BUILD_TIMEOUT_ENV: &str = "MOBILE_DEPLOY_BUILD_TIMEOUT_SECS";

/// Tunables shared by every pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySettings {
    /// On-disk template set; `None` uses the built-in set
    pub template_dir: Option<PathBuf>,
    /// Upper bound for one build toolchain run
    pub build_timeout: Duration,
    /// Upper bound for one version/simulator query
    pub probe_timeout: Duration,
    /// Captured toolchain output lines kept for error reports
    pub tail_lines: usize,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            template_dir: None,
            build_timeout: Duration::from_secs(30 * 60),
            probe_timeout: Duration::from_secs(10),
            tail_lines: 40,
        }
    }
}

impl DeploySettings {
    /// Defaults with optional environment overrides applied
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(dir) = lookup(TEMPLATE_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            settings.template_dir = Some(PathBuf::from(dir));
        }

        if let Some(raw) = lookup(BUILD_TIMEOUT_ENV) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: '{}'", BUILD_TIMEOUT_ENV, raw))?;
            settings.build_timeout = Duration::from_secs(secs);
        }

        Ok(settings)
    }
}

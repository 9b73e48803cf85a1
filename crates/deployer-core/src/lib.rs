//! Deployer Core - Shared library for mobile UI-test project deployment
//!
//! Turns a mobile app source tree into a ready-to-run pytest + Appium
//! automation project. A deployment runs four stages in order:
//!
//! - **Validate** - probe host tools and versions ([`runtime`])
//! - **Build** - invoke the platform toolchain or locate a prebuilt artifact ([`build`])
//! - **Extract** - read the app identifier and display name from the artifact ([`metadata`])
//! - **Materialize** - render the template set into a new project directory ([`project`])
//!
//! The first failing stage aborts the run with a [`StageError`]; nothing is
//! written to disk before the materialize stage.
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based terminal front end
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use deployer_core::{Deployer, DeploymentRequest, DeploySettings, LogReporter, SystemRunner};
//!
//! let request = DeploymentRequest::builder("~/Projects/Foo").skip_venv(true).build()?;
//! let settings = DeploySettings::from_env()?;
//! let report = Deployer::new(&SystemRunner::new(), &LogReporter, &settings)
//!     .deploy(&request)
//!     .await?;
//! println!("{}", report.destination.display());
//! ```

pub mod build;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod platform;
pub mod process;
pub mod project;
pub mod request;
pub mod runtime;
pub mod settings;
pub mod templates;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use build::{AppBuilder, BuildArtifact, Provenance};
pub use error::{DeployError, Result, Stage, StageError};
pub use metadata::AppMetadata;
pub use pipeline::{Deployer, DeploymentReport, LogReporter, Reporter};
pub use platform::Platform;
pub use process::{CommandRunner, SystemRunner};
pub use project::ProjectManifest;
pub use request::DeploymentRequest;
pub use settings::DeploySettings;

#[cfg(feature = "tui")]
pub use tui::run;

/// Generator version recorded in manifests and checked against template sets
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

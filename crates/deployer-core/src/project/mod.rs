//! Generated project layout, materialization and post-steps

pub mod manifest;
pub mod materializer;
pub mod paths;
pub mod venv;

pub use manifest::{ManifestEntry, ManifestHeader, ProjectManifest, MANIFEST_FILE};
pub use materializer::materialize;
pub use paths::{destination_root, resolve_app_name, PROJECT_SUFFIX};
pub use venv::setup_virtualenv;

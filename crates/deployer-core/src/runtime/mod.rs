//! Environment validation
//!
//! This module provides:
//! - Tool probing with semantic version checks
//! - Version parsing shared with template compatibility checks

pub mod check;
pub mod version;

pub use check::{EnvironmentValidator, Probe, ToolCheck, ToolSpec, ValidationResult};
pub use version::{check_compatibility, extract_version};

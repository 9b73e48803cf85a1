//! Template loading, validation and placeholder rendering
//!
//! This module provides:
//! - Template manifest types (RootManifest, TemplateManifest)
//! - Template sources: built into the binary or a local directory
//! - Validated per-platform template sets
//! - `{{key}}` placeholder substitution

pub mod manifest;
pub mod placeholder;
pub mod set;
pub mod source;

pub use manifest::{RootManifest, TemplateFile, TemplateManifest};
pub use placeholder::{is_binary, render, Escape, Rendered, Substitutions};
pub use set::{TemplateEntry, TemplateSet};
pub use source::TemplateSource;

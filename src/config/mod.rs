// src/config/mod.rs

//! Pipeline definition loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a pipeline file from disk (`loader.rs`).
//! - Validate task bodies, thresholds and graph correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_fs, load_from_path};
pub use model::{
    CheckConfig, NotifySection, PipelineFile, PipelineSection, RawPipelineFile, TaskConfig,
};
pub use validate::validate_config;

// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

pub use crate::dag::graph::ConstructionError;

#[derive(Error, Debug)]
pub enum DaglineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid graph: {0}")]
    Construction(#[from] ConstructionError),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DaglineError>;

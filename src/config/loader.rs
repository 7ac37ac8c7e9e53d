// src/config/loader.rs

use std::path::{Path, PathBuf};

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};

/// Load a pipeline file from a given path and return the raw
/// `RawPipelineFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPipelineFile> {
    load_from_fs(&RealFileSystem, path.as_ref())
}

/// Same as [`load_from_path`], reading through the given [`FileSystem`].
pub fn load_from_fs(fs: &dyn FileSystem, path: &Path) -> Result<RawPipelineFile> {
    let contents = fs.read_to_string(path)?;
    let config: RawPipelineFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a pipeline file from path and validate it.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks task bodies, thresholds, durations and the task graph
///   (unknown `after` references, duplicates, cycles).
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineFile> {
    let raw_config = load_from_path(&path)?;
    let config = PipelineFile::try_from(raw_config)?;
    Ok(config)
}

/// Helper to resolve a default pipeline path (`Pipeline.toml` in the
/// current working directory).
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Pipeline.toml")
}

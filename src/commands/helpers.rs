//! Command helper utilities

use std::path::Path;

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::{Result, io_error};

/// Load the pipeline configuration for a command
///
/// An explicit path must exist; otherwise the default location is used if
/// present, then environment overrides are applied.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    PipelineConfig::load(path)
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io_error(format!("Failed to render JSON: {e}")))?;
    println!("{json}");
    Ok(())
}

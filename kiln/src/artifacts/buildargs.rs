//! Build-argument environment export.

use crate::errors::BuildError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Renders build arguments as a sourceable shell script.
///
/// Keys are emitted in sorted order so the script is deterministic; values
/// are single-quoted with embedded quotes escaped.
#[must_use]
pub fn render_env_export(args: &BTreeMap<String, String>) -> String {
    let mut script = String::from("#!/bin/sh\n");
    for (key, value) in args {
        let escaped = value.replace('\'', r"'\''");
        script.push_str(&format!("export {key}='{escaped}'\n"));
    }
    script
}

/// Writes the build-argument export script into a directory.
///
/// # Errors
///
/// Returns an error when the write fails.
pub fn write_env_script(
    args: &BTreeMap<String, String>,
    dir: &Path,
    file_name: &str,
) -> Result<PathBuf, BuildError> {
    let out_path = dir.join(file_name);
    std::fs::write(&out_path, render_env_export(args))?;
    Ok(out_path)
}

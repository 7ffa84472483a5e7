// External tool discovery

use anyhow::{Context, Result};
use std::process::Command;

use crate::error::PlayfitError;

/// Check if ffmpeg is available and return its version line
pub fn ffmpeg_version() -> Result<String> {
    tool_version("ffmpeg")
}

/// Check if ffprobe is available and return its version line
pub fn ffprobe_version() -> Result<String> {
    tool_version("ffprobe")
}

fn tool_version(tool: &str) -> Result<String> {
    let output = Command::new(tool)
        .arg("-version")
        .output()
        .with_context(|| format!("Failed to execute {0}. Is {0} installed and in PATH?", tool))?;

    if !output.status.success() {
        anyhow::bail!("{} command failed with status: {}", tool, output.status);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("unknown version");

    Ok(first_line.to_string())
}

/// Fail fast before any probing or encoding if either tool is missing.
/// Returns the version lines on success.
pub fn require_tools() -> crate::error::Result<(String, String)> {
    let ffmpeg = ffmpeg_version().map_err(|_| PlayfitError::MissingTool {
        tool: "ffmpeg".to_string(),
    })?;
    let ffprobe = ffprobe_version().map_err(|_| PlayfitError::MissingTool {
        tool: "ffprobe".to_string(),
    })?;
    Ok((ffmpeg, ffprobe))
}

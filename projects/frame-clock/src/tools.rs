// External command-line tools: ffmpeg for the re-encode, tesseract for OCR.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Resolves a tool binary: explicit override, then common install
/// locations, then whatever `PATH` finds.
pub fn resolve_tool(name: &str, explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let candidates = [
        format!("/opt/homebrew/bin/{}", name),
        format!("/usr/local/bin/{}", name),
        format!("/usr/bin/{}", name),
    ];

    for candidate in &candidates {
        let path = Path::new(candidate);
        if path.is_file() {
            return path.to_path_buf();
        }
    }

    PathBuf::from(name)
}

/// Runs `<tool> <version_flag>` and fails if the tool is missing or broken.
pub fn verify_tool(path: &Path, version_flag: &str) -> Result<String> {
    let output = Command::new(path)
        .arg(version_flag)
        .output()
        .with_context(|| format!("Required tool not found: {}", path.display()))?;

    if !output.status.success() {
        bail!(
            "{} {} exited with {}",
            path.display(),
            version_flag,
            output.status
        );
    }

    // tesseract prints its banner on stderr in older releases
    let banner = if output.stdout.is_empty() {
        &output.stderr
    } else {
        &output.stdout
    };
    let first_line = String::from_utf8_lossy(banner)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();

    tracing::info!("Found {}: {}", path.display(), first_line);
    Ok(first_line)
}

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-encodes an upload into something every browser can seek and autoplay.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// `ffmpeg -y -i <input> -c:v libx264 <output>`
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    fn build_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        let args = Self::build_args(input, output);
        tracing::info!("Running {} {}", self.binary.display(), args.join(" "));

        let output_status = Command::new(&self.binary)
            .args(&args)
            .output()
            .with_context(|| {
                format!(
                    "Failed to run ffmpeg at {} (is it installed?)",
                    self.binary.display()
                )
            })?;

        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            bail!(
                "ffmpeg exited with {}: {}",
                output_status.status,
                tail.into_iter().rev().collect::<Vec<_>>().join("\n")
            );
        }

        if !output.exists() {
            bail!("ffmpeg reported success but {} is missing", output.display());
        }

        Ok(())
    }
}

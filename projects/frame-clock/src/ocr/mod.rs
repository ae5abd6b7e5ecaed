// Overlay clock recognition

pub mod extractor;
pub mod overlay;
pub mod preprocess;

use anyhow::{anyhow, bail, Context, Result};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

pub use extractor::TimestampExtractor;
pub use overlay::TimestampTriple;
pub use preprocess::OverlayRegion;

/// Turns a preprocessed image into text.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &Mat) -> Result<String>;
}

/// Runs the `tesseract` binary with the image piped in as PNG.
pub struct TesseractCli {
    binary: PathBuf,
    page_seg_mode: u8,
}

impl TesseractCli {
    /// Page segmentation mode 6: a single uniform block of text.
    pub const UNIFORM_BLOCK: u8 = 6;

    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary,
            page_seg_mode: Self::UNIFORM_BLOCK,
        }
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, image: &Mat) -> Result<String> {
        let mut png = Vector::<u8>::new();
        if !imgcodecs::imencode(".png", image, &mut png, &Vector::new())? {
            bail!("Failed to encode OCR input as PNG");
        }

        let psm = self.page_seg_mode.to_string();
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "--psm", psm.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("tesseract stdin unavailable"))?;
            stdin.write_all(png.as_slice())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            bail!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

use anyhow::Result;
use opencv::prelude::*;
use opencv::{core, imgproc};
use serde::{Deserialize, Serialize};

/// Pixel rectangle of a frame that holds the overlay clock.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for OverlayRegion {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 850,
            height: 50,
        }
    }
}

/// Copies `region` out of `img`, trimmed to the image bounds.
pub fn crop_region(img: &core::Mat, region: &OverlayRegion) -> Result<core::Mat> {
    let size = img.size()?;

    let x_clamped = region.x.clamp(0, size.width);
    let y_clamped = region.y.clamp(0, size.height);
    let w_clamped = region.width.clamp(0, size.width - x_clamped);
    let h_clamped = region.height.clamp(0, size.height - y_clamped);

    if w_clamped <= 0 || h_clamped <= 0 {
        anyhow::bail!(
            "Invalid crop dimensions: {}x{} (region: {:?}, frame: {}x{})",
            w_clamped,
            h_clamped,
            region,
            size.width,
            size.height
        );
    }

    let roi = core::Rect::new(x_clamped, y_clamped, w_clamped, h_clamped);
    let cropped = core::Mat::roi(img, roi)?;

    let mut out = core::Mat::default();
    cropped.copy_to(&mut out)?;

    Ok(out)
}

/// Grayscale plus a fixed global threshold: pixels above `threshold` go white.
pub fn binarize(img: &core::Mat, threshold: f64) -> Result<core::Mat> {
    let gray = if img.channels() == 1 {
        img.try_clone()?
    } else {
        let mut gray = core::Mat::default();
        imgproc::cvt_color(img, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
        gray
    };

    let mut binary = core::Mat::default();
    imgproc::threshold(&gray, &mut binary, threshold, 255.0, imgproc::THRESH_BINARY)?;

    Ok(binary)
}

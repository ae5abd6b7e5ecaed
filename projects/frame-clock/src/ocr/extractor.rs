use crate::ocr::overlay::{parse_overlay_text, TimestampTriple};
use crate::ocr::preprocess::{binarize, crop_region, OverlayRegion};
use crate::ocr::TextRecognizer;
use anyhow::Result;
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use std::path::PathBuf;

pub const DEFAULT_THRESHOLD: f64 = 127.0;

/// Reads the burned-in `Date/Time/Frame` overlay of a single frame.
pub struct TimestampExtractor {
    recognizer: Box<dyn TextRecognizer>,
    region: OverlayRegion,
    threshold: f64,
    debug_crop: Option<PathBuf>,
}

impl TimestampExtractor {
    pub fn new(recognizer: Box<dyn TextRecognizer>) -> Self {
        Self {
            recognizer,
            region: OverlayRegion::default(),
            threshold: DEFAULT_THRESHOLD,
            debug_crop: None,
        }
    }

    pub fn with_region(mut self, region: OverlayRegion) -> Self {
        self.region = region;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Also write every overlay crop to `path`.
    pub fn with_debug_crop(mut self, path: Option<PathBuf>) -> Self {
        self.debug_crop = path;
        self
    }

    /// Returns the overlay triple, or `None` when the region holds no readable
    /// overlay. Errors along the way are logged, never returned.
    pub fn extract_timestamp(&self, frame: &Mat) -> Option<TimestampTriple> {
        match self.recognize_overlay(frame) {
            Ok(text) => {
                tracing::debug!("Extracted text: {:?}", text);
                let triple = parse_overlay_text(&text);
                if triple.is_none() {
                    tracing::debug!("No overlay timestamp in region {:?}", self.region);
                }
                triple
            }
            Err(e) => {
                tracing::warn!("Error extracting timestamp: {:#}", e);
                None
            }
        }
    }

    fn recognize_overlay(&self, frame: &Mat) -> Result<String> {
        let crop = crop_region(frame, &self.region)?;
        self.save_debug_crop(&crop);
        let binary = binarize(&crop, self.threshold)?;
        self.recognizer.recognize(&binary)
    }

    fn save_debug_crop(&self, crop: &Mat) {
        let Some(path) = &self.debug_crop else {
            return;
        };
        let Some(path_str) = path.to_str() else {
            tracing::warn!("Debug crop path is not valid UTF-8: {:?}", path);
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = imgcodecs::imwrite(path_str, crop, &Vector::new()) {
            tracing::warn!("Failed to write debug crop {}: {}", path_str, e);
        }
    }
}

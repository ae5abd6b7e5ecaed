// Wall-clock start and end of a video, read from the overlay of its first and
// last frames.

use crate::clock::{parse_time, NormalizedTime};
use crate::ocr::{TimestampExtractor, TimestampTriple};
use crate::video::opencv_reader::OpencvReader;
use crate::video::VideoReader;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::Path;

/// Boundary time used when the overlay cannot be read: "assume midnight".
pub const UNKNOWN_TIME: &str = "00:00:00 AM";

/// Opens videos for frame access.
pub trait VideoSource: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoReader>>;
}

pub struct OpencvSource;

impl VideoSource for OpencvSource {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoReader>> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Video path is not valid UTF-8: {:?}", path))?;
        Ok(Box::new(OpencvReader::new(path_str)?))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundaryTimes {
    /// Overlay time of the first frame, or [`UNKNOWN_TIME`].
    pub initial_text: String,
    /// Overlay time of the last frame, or [`UNKNOWN_TIME`].
    pub end_text: String,
    pub initial: Option<NormalizedTime>,
    pub end: Option<NormalizedTime>,
}

impl BoundaryTimes {
    pub fn from_texts(initial_text: String, end_text: String) -> Self {
        let initial = parse_time(&initial_text);
        let end = parse_time(&end_text);
        Self {
            initial_text,
            end_text,
            initial,
            end,
        }
    }
}

/// Frame count and rate as reported by the container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamInfo {
    pub frame_count: usize,
    pub fps: f64,
}

impl StreamInfo {
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }
}

pub struct BoundarySampler<'a> {
    source: &'a dyn VideoSource,
    extractor: &'a TimestampExtractor,
}

impl<'a> BoundarySampler<'a> {
    pub fn new(source: &'a dyn VideoSource, extractor: &'a TimestampExtractor) -> Self {
        Self { source, extractor }
    }

    /// Decodes the single frame at `frame_index` and reads its overlay. The
    /// video handle is released before returning.
    pub fn get_video_timestamp(&self, video: &Path, frame_index: usize) -> Option<TimestampTriple> {
        let frame = match self.read_single_frame(video, frame_index) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    "Could not decode frame {} of {}: {:#}",
                    frame_index,
                    video.display(),
                    e
                );
                return None;
            }
        };
        self.extractor.extract_timestamp(&frame)
    }

    pub fn get_initial_time(&self, video: &Path) -> String {
        self.get_video_timestamp(video, 0)
            .map(|triple| triple.time)
            .unwrap_or_else(|| UNKNOWN_TIME.to_string())
    }

    pub fn stream_info(&self, video: &Path) -> Result<StreamInfo> {
        let reader = self.source.open(video)?;
        Ok(StreamInfo {
            frame_count: reader.frame_count()?,
            fps: reader.source_fps()?,
        })
    }

    pub fn get_end_time(&self, video: &Path) -> String {
        let frame_count = match self.stream_info(video) {
            Ok(info) => {
                tracing::debug!(
                    "{} has {} frames at {:.2} fps",
                    video.display(),
                    info.frame_count,
                    info.fps
                );
                info.frame_count
            }
            Err(e) => {
                tracing::warn!("Could not read frame count of {}: {:#}", video.display(), e);
                0
            }
        };

        let Some(last_frame) = frame_count.checked_sub(1) else {
            return UNKNOWN_TIME.to_string();
        };

        self.get_video_timestamp(video, last_frame)
            .map(|triple| triple.time)
            .unwrap_or_else(|| UNKNOWN_TIME.to_string())
    }

    pub fn boundaries(&self, video: &Path) -> BoundaryTimes {
        let boundaries =
            BoundaryTimes::from_texts(self.get_initial_time(video), self.get_end_time(video));
        tracing::info!(
            "Video {} runs from {} to {}",
            video.display(),
            boundaries.initial_text,
            boundaries.end_text
        );
        boundaries
    }

    fn read_single_frame(&self, video: &Path, frame_index: usize) -> Result<opencv::core::Mat> {
        let mut reader = self.source.open(video)?;
        reader.seek_to_frame(frame_index)?;
        reader.read_frame()
    }
}

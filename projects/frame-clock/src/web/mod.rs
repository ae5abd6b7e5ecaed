pub mod api;
pub mod assets;
pub mod server;

use crate::cache::TranscodeCache;
use crate::ocr::TimestampExtractor;
use crate::table::LogTable;
use crate::video::boundary::{BoundarySampler, BoundaryTimes, VideoSource};
use crate::video::transcode::Transcoder;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Everything the HTTP handlers share.
pub struct AppState {
    pub cache: TranscodeCache,
    pub transcoder: Box<dyn Transcoder>,
    pub source: Box<dyn VideoSource>,
    pub extractor: TimestampExtractor,
    /// Uploaded CSV logs keyed by the hash of their bytes.
    pub logs: RwLock<HashMap<String, Arc<LogTable>>>,
}

impl AppState {
    pub fn new(
        cache: TranscodeCache,
        transcoder: Box<dyn Transcoder>,
        source: Box<dyn VideoSource>,
        extractor: TimestampExtractor,
    ) -> Self {
        Self {
            cache,
            transcoder,
            source,
            extractor,
            logs: RwLock::new(HashMap::new()),
        }
    }

    pub fn boundaries(&self, video: &Path) -> BoundaryTimes {
        BoundarySampler::new(self.source.as_ref(), &self.extractor).boundaries(video)
    }

    pub fn log(&self, log_id: &str) -> Option<Arc<LogTable>> {
        self.logs.read().ok()?.get(log_id).cloned()
    }
}

// Burned-in overlay text format

use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    static ref OVERLAY_PATTERN: Regex = Regex::new(
        r"Date:\s(\d{4}-\d{2}-\d{2})\sTime:\s(\d{2}:\d{2}:\d{2}\s(?:AM|PM))\sFrame:\s(\d{2}:\d{2}:\d{2}:\d{2})"
    )
    .expect("overlay pattern is valid");
}

/// Date, clock time and frame code read from one frame's overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampTriple {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS AM|PM`
    pub time: String,
    /// `HH:MM:SS:FF`
    pub frame_code: String,
}

/// Finds the first complete `Date: .. Time: .. Frame: ..` group in OCR output.
pub fn parse_overlay_text(text: &str) -> Option<TimestampTriple> {
    let caps = OVERLAY_PATTERN.captures(text)?;
    Some(TimestampTriple {
        date: caps[1].to_string(),
        time: caps[2].to_string(),
        frame_code: caps[3].to_string(),
    })
}

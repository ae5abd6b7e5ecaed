use crate::ocr::extractor::DEFAULT_THRESHOLD;
use crate::ocr::{OverlayRegion, TesseractCli, TimestampExtractor};
use crate::tools::resolve_tool;
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Working directory for uploads and transcoded videos
    #[arg(long, global = true, env = "FRAME_CLOCK_WORK_ROOT", default_value = "./work")]
    pub work_root: PathBuf,

    /// Path to the tesseract binary
    #[arg(long, global = true, env = "FRAME_CLOCK_TESSERACT")]
    pub tesseract: Option<PathBuf>,

    /// Path to the ffmpeg binary
    #[arg(long, global = true, env = "FRAME_CLOCK_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    /// Left edge of the overlay region, in pixels
    #[arg(long, global = true, default_value_t = 0)]
    pub region_x: i32,

    /// Top edge of the overlay region, in pixels
    #[arg(long, global = true, default_value_t = 0)]
    pub region_y: i32,

    /// Width of the overlay region, in pixels
    #[arg(long, global = true, default_value_t = 850)]
    pub region_width: i32,

    /// Height of the overlay region, in pixels
    #[arg(long, global = true, default_value_t = 50)]
    pub region_height: i32,

    /// Binarization threshold applied before OCR
    #[arg(long, global = true, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f64,

    /// Write every overlay crop to this image file
    #[arg(long, global = true, env = "FRAME_CLOCK_DEBUG_CROP")]
    pub debug_crop: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the player and its HTTP API (default)
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port to bind to
        #[arg(long, default_value_t = 12207)]
        port: u16,

        /// Largest accepted upload, in megabytes
        #[arg(long, default_value_t = 2048)]
        max_upload_mb: usize,
    },
    /// Print the overlay start and end time of a video
    Probe {
        /// Video file to read
        video: PathBuf,
    },
    /// Compute where a CSV row falls inside a video
    Seek {
        /// Video file to read
        video: PathBuf,

        /// CSV log with a "DATE AND TIME" column
        csv: PathBuf,

        /// Column to select on (defaults to the first column)
        #[arg(long)]
        column: Option<String>,

        /// Value of the column to select
        #[arg(long)]
        value: String,

        /// Manual jump time (HH:MM:SS)
        #[arg(long, default_value = "00:00:00")]
        jump: String,

        /// Skip the H.264 re-encode and read the file as is
        #[arg(long)]
        no_transcode: bool,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Serve {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 12207,
            max_upload_mb: 2048,
        }
    }
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn region(&self) -> OverlayRegion {
        OverlayRegion {
            x: self.region_x,
            y: self.region_y,
            width: self.region_width,
            height: self.region_height,
        }
    }

    pub fn tesseract_path(&self) -> PathBuf {
        resolve_tool("tesseract", self.tesseract.as_deref())
    }

    pub fn ffmpeg_path(&self) -> PathBuf {
        resolve_tool("ffmpeg", self.ffmpeg.as_deref())
    }

    pub fn build_extractor(&self) -> TimestampExtractor {
        TimestampExtractor::new(Box::new(TesseractCli::new(self.tesseract_path())))
            .with_region(self.region())
            .with_threshold(self.threshold)
            .with_debug_crop(self.debug_crop.clone())
    }
}

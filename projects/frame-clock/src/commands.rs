// One-shot command line modes

use crate::cache::TranscodeCache;
use crate::cli::Args;
use crate::clock::format_seconds;
use crate::playback::{plan_playback, SessionContext};
use crate::table::LogTable;
use crate::tools::verify_tool;
use crate::video::boundary::{BoundarySampler, OpencvSource};
use crate::video::transcode::FfmpegTranscoder;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct SeekRequest {
    pub video: PathBuf,
    pub csv: PathBuf,
    pub column: Option<String>,
    pub value: String,
    pub jump: String,
    pub no_transcode: bool,
}

fn create_spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

pub fn probe(args: &Args, video: &Path) -> Result<()> {
    verify_tool(&args.tesseract_path(), "--version")?;

    let extractor = args.build_extractor();
    let sampler = BoundarySampler::new(&OpencvSource, &extractor);
    let info = sampler.stream_info(video)?;
    let boundaries = sampler.boundaries(video);

    println!(
        "Video length: {} ({} frames at {:.2} fps)",
        format_seconds(info.duration_secs()),
        info.frame_count,
        info.fps
    );
    println!("Initial Time from Video: {}", boundaries.initial_text);
    println!("End Time from Video: {}", boundaries.end_text);
    Ok(())
}

pub fn seek(args: &Args, request: &SeekRequest) -> Result<()> {
    verify_tool(&args.tesseract_path(), "--version")?;

    let csv_bytes = fs::read(&request.csv)
        .with_context(|| format!("Failed to read {}", request.csv.display()))?;
    let table = LogTable::from_bytes(&csv_bytes)?;

    let video_path = if request.no_transcode {
        request.video.clone()
    } else {
        let ffmpeg = args.ffmpeg_path();
        verify_tool(&ffmpeg, "-version")?;
        let cache = TranscodeCache::open(&args.work_root.join("videos"))?;
        let bytes = fs::read(&request.video)
            .with_context(|| format!("Failed to read {}", request.video.display()))?;
        let name = request
            .video
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("video.mp4");

        let pb = create_spinner(&format!("Transcoding {} to H.264...", name))?;
        let (cached, hit) = cache.get_or_transcode(&bytes, name, &FfmpegTranscoder::new(ffmpeg))?;
        pb.finish_with_message(if hit {
            format!("Transcoded {} (cached)", name)
        } else {
            format!("Transcoded {}", name)
        });
        cached.video_path()
    };

    let extractor = args.build_extractor();
    let sampler = BoundarySampler::new(&OpencvSource, &extractor);
    let boundaries = sampler.boundaries(&video_path);

    let mut session = SessionContext::select(
        request
            .column
            .clone()
            .or_else(|| table.headers.first().cloned())
            .unwrap_or_default(),
        request.value.clone(),
    );
    // The jump time is entered for this selection, not carried over from another.
    session.previous_value = session.value.clone();
    session.jump_time = request.jump.clone();

    let plan = plan_playback(&table, &boundaries, session);

    println!("Initial Time from Video: {}", plan.initial_time.as_deref().unwrap_or("-"));
    println!("End Time from Video: {}", plan.end_time.as_deref().unwrap_or("-"));
    for message in &plan.messages {
        println!("{}", message);
    }
    match plan.offset {
        Some(offset) => println!(
            "Start at {:.0}s ({}) in {}",
            offset.seconds(),
            plan.offset_display.as_deref().unwrap_or_default(),
            video_path.display()
        ),
        None => println!("Nothing to play."),
    }

    Ok(())
}

use crate::cache::TranscodeCache;
use crate::cli::Args;
use crate::tools::verify_tool;
use crate::video::boundary::OpencvSource;
use crate::video::transcode::FfmpegTranscoder;
use crate::web::api::{
    delete_log_handler, delete_video_handler, get_log_values_handler, get_videos_handler,
    seek_handler, upload_log_handler, upload_video_handler,
};
use crate::web::assets::{index_handler, static_handler};
use crate::web::AppState;
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let media = ServeDir::new(state.cache.root());

    Router::new()
        .route("/api/videos", get(get_videos_handler).post(upload_video_handler))
        .route("/api/videos/:video_id", delete(delete_video_handler))
        .route("/api/videos/:video_id/seek", post(seek_handler))
        .route("/api/logs", post(upload_log_handler))
        .route("/api/logs/:log_id", delete(delete_log_handler))
        .route("/api/logs/:log_id/values", get(get_log_values_handler))
        .nest_service("/media", media)
        .route("/", get(index_handler))
        .route("/*path", get(static_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(args: &Args, host: IpAddr, port: u16, max_upload_mb: usize) -> Result<()> {
    // Missing external tools are setup errors, not per-request failures
    let ffmpeg = args.ffmpeg_path();
    verify_tool(&ffmpeg, "-version")?;
    verify_tool(&args.tesseract_path(), "--version")?;

    let cache = TranscodeCache::open(&args.work_root.join("videos"))?;
    let state = Arc::new(AppState::new(
        cache,
        Box::new(FfmpegTranscoder::new(ffmpeg)),
        Box::new(OpencvSource),
        args.build_extractor(),
    ));

    let mut current_port = port;
    let listener = loop {
        let addr = SocketAddr::new(host, current_port);
        match TcpListener::bind(addr) {
            Ok(listener) => {
                listener.set_nonblocking(true)?;
                info!("Successfully bound to {}", addr);
                break listener;
            }
            Err(e) => {
                warn!("Failed to bind to {}: {}. Trying next port...", addr, e);
                current_port = current_port.wrapping_add(1);
                if current_port == 0 {
                    return Err(anyhow::anyhow!("No available ports found"));
                }
            }
        }
    };

    let app = build_router(state, max_upload_mb.saturating_mul(1024 * 1024));

    let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
    info!(
        "Frame clock server started on http://{}",
        tokio_listener.local_addr()?
    );

    axum::serve(tokio_listener, app).await?;

    Ok(())
}

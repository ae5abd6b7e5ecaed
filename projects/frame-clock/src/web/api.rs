use crate::cache::{content_key, is_valid_key, CachedVideo};
use crate::playback::{plan_playback, PlaybackPlan, SessionContext};
use crate::table::LogTable;
use crate::video::boundary::BoundaryTimes;
use crate::web::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Handler failure reported to the client as `{ "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(what: &str, id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("Unknown {}: {}", what, id))
    }

    fn internal(err: anyhow::Error) -> Self {
        tracing::error!("{:#}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

#[derive(Serialize)]
pub struct UploadedVideo {
    pub video_id: String,
    pub name: String,
    pub url: String,
    pub cached: bool,
    pub boundaries: BoundaryTimes,
}

#[derive(Serialize)]
pub struct UploadedLog {
    pub log_id: String,
    pub columns: Vec<String>,
    pub row_count: usize,
}

#[derive(Deserialize)]
pub struct ValuesQuery {
    pub column: String,
}

#[derive(Deserialize)]
pub struct SeekRequest {
    pub log_id: String,
    #[serde(default)]
    pub session: SessionContext,
}

#[derive(Serialize)]
pub struct SeekResponse {
    pub url: String,
    #[serde(flatten)]
    pub plan: PlaybackPlan,
}

struct UploadedFile {
    name: String,
    bytes: Vec<u8>,
}

/// Pulls the `file` field out of a multipart body.
async fn read_file_field(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
        return Ok(UploadedFile {
            name,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::new(
        StatusCode::BAD_REQUEST,
        "Multipart body has no 'file' field",
    ))
}

async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ApiError::internal(anyhow::anyhow!("Worker task failed: {}", e)))?
        .map_err(ApiError::internal)
}

fn cached_video(state: &AppState, video_id: &str) -> Result<CachedVideo, ApiError> {
    if !is_valid_key(video_id) {
        return Err(ApiError::not_found("video", video_id));
    }
    state
        .cache
        .get(video_id)
        .ok_or_else(|| ApiError::not_found("video", video_id))
}

/// Stores and transcodes an uploaded video, then reads its boundary times.
pub async fn upload_video_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadedVideo>, ApiError> {
    let upload = read_file_field(multipart).await?;
    tracing::info!("Received video {} ({} bytes)", upload.name, upload.bytes.len());

    let uploaded = run_blocking(move || {
        let (video, hit) =
            state
                .cache
                .get_or_transcode(&upload.bytes, &upload.name, state.transcoder.as_ref())?;
        let boundaries = state.boundaries(&video.video_path());
        Ok(UploadedVideo {
            video_id: video.key.clone(),
            name: video.original_name.clone(),
            url: video.media_url(),
            cached: hit,
            boundaries,
        })
    })
    .await?;

    Ok(Json(uploaded))
}

#[derive(Serialize)]
pub struct VideoInfo {
    pub video_id: String,
    pub name: String,
    pub url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn get_videos_handler(State(state): State<Arc<AppState>>) -> Json<Vec<VideoInfo>> {
    let mut videos = state.cache.list();
    videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let info_list = videos
        .into_iter()
        .map(|video| VideoInfo {
            url: video.media_url(),
            video_id: video.key,
            name: video.original_name,
            created_at: video.created_at,
        })
        .collect();

    Json(info_list)
}

/// Explicit cache invalidation.
pub async fn delete_video_handler(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state.cache.invalidate(&video_id).map_err(ApiError::internal)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("video", &video_id))
    }
}

pub async fn upload_log_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadedLog>, ApiError> {
    let upload = read_file_field(multipart).await?;
    let table = LogTable::from_bytes(&upload.bytes)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("{:#}", e)))?;
    store_log(&state, &upload.bytes, table).map(Json)
}

fn store_log(state: &AppState, bytes: &[u8], table: LogTable) -> Result<UploadedLog, ApiError> {
    let log_id = content_key(bytes);
    let info = UploadedLog {
        log_id: log_id.clone(),
        columns: table.headers.clone(),
        row_count: table.rows.len(),
    };
    tracing::info!(
        "Stored CSV log {} ({} rows, {} columns)",
        log_id,
        info.row_count,
        info.columns.len()
    );
    state
        .logs
        .write()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("CSV log store poisoned")))?
        .insert(log_id, Arc::new(table));
    Ok(info)
}

/// Drops an uploaded CSV log.
pub async fn delete_log_handler(
    State(state): State<Arc<AppState>>,
    Path(log_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .logs
        .write()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("CSV log store poisoned")))?
        .remove(&log_id);
    match removed {
        Some(_) => {
            tracing::info!("Removed CSV log {}", log_id);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::not_found("log", &log_id)),
    }
}

pub async fn get_log_values_handler(
    State(state): State<Arc<AppState>>,
    Path(log_id): Path<String>,
    Query(query): Query<ValuesQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let table = state
        .log(&log_id)
        .ok_or_else(|| ApiError::not_found("log", &log_id))?;
    table
        .values(&query.column)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("column", &query.column))
}

/// Computes the playback position for the selected CSV row.
pub async fn seek_handler(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    Json(request): Json<SeekRequest>,
) -> Result<Json<SeekResponse>, ApiError> {
    let video = cached_video(&state, &video_id)?;
    let table = state
        .log(&request.log_id)
        .ok_or_else(|| ApiError::not_found("log", &request.log_id))?;

    let response = run_blocking(move || {
        let boundaries = state.boundaries(&video.video_path());
        let plan = plan_playback(&table, &boundaries, request.session);
        Ok(SeekResponse {
            url: video.media_url(),
            plan,
        })
    })
    .await?;

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TranscodeCache;
    use crate::ocr::{TextRecognizer, TimestampExtractor};
    use crate::video::boundary::VideoSource;
    use crate::video::transcode::Transcoder;
    use crate::video::VideoReader;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{header, Request};
    use opencv::core::{Mat, Scalar, CV_8UC3};

    struct NoTranscode;

    impl Transcoder for NoTranscode {
        fn transcode(&self, input: &std::path::Path, output: &std::path::Path) -> anyhow::Result<()> {
            std::fs::copy(input, output)?;
            Ok(())
        }
    }

    /// Two-frame video whose overlay reads 09:00 then 09:10.
    struct TwoFrames {
        position: usize,
    }

    impl VideoReader for TwoFrames {
        fn frame_count(&self) -> anyhow::Result<usize> {
            Ok(2)
        }

        fn source_fps(&self) -> anyhow::Result<f64> {
            Ok(1.0 / 600.0)
        }

        fn seek_to_frame(&mut self, frame_num: usize) -> anyhow::Result<()> {
            self.position = frame_num;
            Ok(())
        }

        fn read_frame(&mut self) -> anyhow::Result<Mat> {
            let level = if self.position == 0 { 0.0 } else { 255.0 };
            Ok(Mat::new_rows_cols_with_default(
                60,
                900,
                CV_8UC3,
                Scalar::all(level),
            )?)
        }
    }

    struct TwoFrameSource;

    impl VideoSource for TwoFrameSource {
        fn open(&self, _path: &std::path::Path) -> anyhow::Result<Box<dyn VideoReader>> {
            Ok(Box::new(TwoFrames { position: 0 }))
        }
    }

    struct ClockByBrightness;

    impl TextRecognizer for ClockByBrightness {
        fn recognize(&self, image: &Mat) -> anyhow::Result<String> {
            use opencv::prelude::*;
            let time = if *image.at_2d::<u8>(0, 0)? == 0 {
                "09:00:00 AM"
            } else {
                "09:10:00 AM"
            };
            Ok(format!("Date: 2024-03-18 Time: {} Frame: 00:00:00:00", time))
        }
    }

    fn state(root: &std::path::Path) -> Arc<AppState> {
        Arc::new(AppState::new(
            TranscodeCache::open(root).unwrap(),
            Box::new(NoTranscode),
            Box::new(TwoFrameSource),
            TimestampExtractor::new(Box::new(ClockByBrightness)),
        ))
    }

    const LOG: &[u8] = b"EVENT,DATE AND TIME\narrival,2024-03-18 09:05:00\nlate,2024-03-18 10:00:00\n";

    #[tokio::test]
    async fn test_seek_for_uploaded_video_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let (video, _) = state
            .cache
            .get_or_transcode(b"video bytes", "clip.mp4", state.transcoder.as_ref())
            .unwrap();
        let log = store_log(&state, LOG, LogTable::from_bytes(LOG).unwrap()).unwrap();
        assert_eq!(log.row_count, 2);

        let Json(videos) = get_videos_handler(State(state.clone())).await;
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].name, "clip.mp4");

        let Json(response) = seek_handler(
            State(state.clone()),
            Path(video.key.clone()),
            Json(SeekRequest {
                log_id: log.log_id.clone(),
                session: SessionContext::select("EVENT", "arrival"),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.plan.offset.unwrap().seconds(), 300.0);
        assert_eq!(response.url, video.media_url());

        let Json(response) = seek_handler(
            State(state.clone()),
            Path(video.key.clone()),
            Json(SeekRequest {
                log_id: log.log_id,
                session: SessionContext::select("EVENT", "late"),
            }),
        )
        .await
        .unwrap();
        assert_eq!(
            response.plan.messages,
            vec!["Extracted time is out of the valid range. Playing from the start."]
        );
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let err = seek_handler(
            State(state.clone()),
            Path("nope".to_string()),
            Json(SeekRequest {
                log_id: "nope".to_string(),
                session: SessionContext::default(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = get_log_values_handler(
            State(state.clone()),
            Path("nope".to_string()),
            Query(ValuesQuery {
                column: "EVENT".to_string(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = delete_video_handler(State(state), Path(content_key(b"never uploaded")))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_log_values() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let log = store_log(&state, LOG, LogTable::from_bytes(LOG).unwrap()).unwrap();

        let Json(values) = get_log_values_handler(
            State(state),
            Path(log.log_id),
            Query(ValuesQuery {
                column: "EVENT".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(values, vec!["arrival", "late"]);
    }

    async fn multipart_upload(field: &str, file_name: &str, bytes: &[u8]) -> Multipart {
        let boundary = "frame-clock-boundary";
        let mut body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            boundary, field, file_name
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/api/videos")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_upload_video_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let upload = multipart_upload("file", "clip.mp4", b"video bytes").await;
        let Json(uploaded) = upload_video_handler(State(state.clone()), upload)
            .await
            .unwrap();
        assert_eq!(uploaded.name, "clip.mp4");
        assert!(!uploaded.cached);
        assert_eq!(uploaded.video_id, content_key(b"video bytes"));
        assert_eq!(uploaded.boundaries.initial_text, "09:00:00 AM");
        assert_eq!(uploaded.boundaries.end_text, "09:10:00 AM");
        assert!(state.cache.get(&uploaded.video_id).is_some());

        let upload = multipart_upload("file", "again.mp4", b"video bytes").await;
        let Json(again) = upload_video_handler(State(state.clone()), upload)
            .await
            .unwrap();
        assert!(again.cached);
        assert_eq!(again.url, uploaded.url);
    }

    #[tokio::test]
    async fn test_upload_without_file_field_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let upload = multipart_upload("attachment", "clip.mp4", b"video bytes").await;
        let err = upload_video_handler(State(state.clone()), upload)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(state.cache.list().is_empty());
    }

    #[tokio::test]
    async fn test_delete_log() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let log = store_log(&state, LOG, LogTable::from_bytes(LOG).unwrap()).unwrap();

        let status = delete_log_handler(State(state.clone()), Path(log.log_id.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.log(&log.log_id).is_none());

        let err = delete_log_handler(State(state), Path(log.log_id))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_log_reports_poisoned_store() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let holder = state.clone();
        let _ = std::thread::spawn(move || {
            let _logs = holder.logs.write().unwrap();
            panic!("writer died holding the log store");
        })
        .join();

        let err = store_log(&state, LOG, LogTable::from_bytes(LOG).unwrap())
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}

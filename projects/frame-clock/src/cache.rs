// Content-addressed store of transcoded uploads
//
// Each distinct upload (by SHA-256 of its bytes) is transcoded once and kept in
// `<root>/<key>/` next to a metadata.json describing it.

use crate::video::transcode::Transcoder;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use walkdir::WalkDir;

const METADATA_FILE: &str = "metadata.json";
const TRANSCODED_FILE: &str = "out_h264.mp4";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CachedVideo {
    pub key: String,
    pub original_name: String,
    pub created_at: DateTime<Utc>,
    pub file_name: String,
    #[serde(skip)]
    pub dir: PathBuf,
}

impl CachedVideo {
    pub fn video_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Location under the server's `/media` mount.
    pub fn media_url(&self) -> String {
        format!("/media/{}/{}", self.key, self.file_name)
    }
}

/// Hex SHA-256 of the uploaded bytes.
pub fn content_key(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn is_valid_key(key: &str) -> bool {
    key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit())
}

pub struct TranscodeCache {
    root: PathBuf,
    entries: RwLock<HashMap<String, CachedVideo>>,
    /// One lock per key; whoever holds it owns `<root>/<key>/`.
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TranscodeCache {
    /// Opens (creating if needed) the cache at `root` and indexes the entries
    /// already on disk.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create cache root {}", root.display()))?;

        let mut entries = HashMap::new();
        for entry in WalkDir::new(root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() == METADATA_FILE)
        {
            let dir = match entry.path().parent() {
                Some(dir) => dir.to_path_buf(),
                None => continue,
            };
            match load_metadata(entry.path(), &dir) {
                Ok(video) if video.video_path().exists() => {
                    entries.insert(video.key.clone(), video);
                }
                Ok(video) => {
                    tracing::warn!("Skipping cache entry {} without video", video.key);
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable cache entry {:?}: {:#}", dir, e);
                }
            }
        }

        tracing::info!("Transcode cache at {} holds {} videos", root.display(), entries.len());

        Ok(Self {
            root: root.to_path_buf(),
            entries: RwLock::new(entries),
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    fn key_lock(&self, key: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .key_locks
            .lock()
            .map_err(|_| anyhow::anyhow!("Cache key locks poisoned"))?;
        Ok(locks.entry(key.to_string()).or_default().clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, key: &str) -> Option<CachedVideo> {
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|video| video.video_path().exists())
            .cloned()
    }

    pub fn list(&self) -> Vec<CachedVideo> {
        self.entries
            .read()
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the transcoded video for `bytes`, running `transcoder` only on a
    /// miss. The flag is true on a cache hit.
    pub fn get_or_transcode(
        &self,
        bytes: &[u8],
        original_name: &str,
        transcoder: &dyn Transcoder,
    ) -> Result<(CachedVideo, bool)> {
        let key = content_key(bytes);
        if let Some(video) = self.get(&key) {
            tracing::info!("Cache hit for {} ({})", original_name, key);
            return Ok((video, true));
        }

        // Concurrent uploads of the same bytes wait here for the first one.
        let key_lock = self.key_lock(&key)?;
        let _guard = key_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Cache key lock poisoned for {}", key))?;
        if let Some(video) = self.get(&key) {
            tracing::info!("Cache hit for {} ({}) after waiting", original_name, key);
            return Ok((video, true));
        }

        // Leftovers of an interrupted run
        let dir = self.root.join(&key);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        let extension = Path::new(original_name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_else(|| "mp4".to_string());
        let source_path = dir.join(format!("source.{}", extension));
        fs::write(&source_path, bytes)
            .with_context(|| format!("Failed to store upload at {}", source_path.display()))?;

        let video = CachedVideo {
            key: key.clone(),
            original_name: original_name.to_string(),
            created_at: Utc::now(),
            file_name: TRANSCODED_FILE.to_string(),
            dir: dir.clone(),
        };

        if let Err(e) = transcoder.transcode(&source_path, &video.video_path()) {
            let _ = fs::remove_dir_all(&dir);
            return Err(e.context(format!("Transcoding {} failed", original_name)));
        }

        let content = serde_json::to_string_pretty(&video)?;
        fs::write(dir.join(METADATA_FILE), content)?;

        self.entries
            .write()
            .map_err(|_| anyhow::anyhow!("Cache index poisoned"))?
            .insert(key, video.clone());

        Ok((video, false))
    }

    /// Drops an entry and its files. Returns false if nothing was cached.
    pub fn invalidate(&self, key: &str) -> Result<bool> {
        if !is_valid_key(key) {
            return Ok(false);
        }

        let key_lock = self.key_lock(key)?;
        let _guard = key_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Cache key lock poisoned for {}", key))?;

        let removed = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("Cache index poisoned"))?
            .remove(key);

        let dir = self.root.join(key);
        let existed_on_disk = dir.exists();
        if existed_on_disk {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
        }

        if removed.is_some() || existed_on_disk {
            tracing::info!("Invalidated cached video {}", key);
        }
        Ok(removed.is_some() || existed_on_disk)
    }
}

fn load_metadata(path: &Path, dir: &Path) -> Result<CachedVideo> {
    let content = fs::read_to_string(path)?;
    let mut video: CachedVideo = serde_json::from_str(&content)?;
    video.dir = dir.to_path_buf();
    Ok(video)
}

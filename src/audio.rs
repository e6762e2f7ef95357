//! Per-verse recitation audio.

use crate::ffmpeg;
use crate::logi;
use async_trait::async_trait;
use reqwest::Client;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub chapter: u32,
    pub verse: u32,
    pub path: PathBuf,
    pub duration_secs: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("download of {chapter}:{verse} failed: {reason}")]
    Download { chapter: u32, verse: u32, reason: String },

    #[error("could not measure {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("concatenation failed: {0}")]
    Concat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait RecitationSource: Send + Sync {
    /// Obtains the recitation of one verse and its duration in seconds.
    async fn fetch_segment(&self, chapter: u32, verse: u32) -> Result<AudioSegment, AudioError>;

    /// Joins `segments` in order into a single audio file at `out`.
    async fn concat(&self, segments: &[AudioSegment], out: &Path) -> Result<PathBuf, AudioError>;
}

/// Verse mp3s from an EveryAyah-style mirror, cached on disk by reciter.
pub struct EveryAyahSource {
    client: Client,
    base_url: String,
    reciter_id: String,
    cache_dir: PathBuf,
    temp_dir: PathBuf,
}

impl EveryAyahSource {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        reciter_id: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            reciter_id: reciter_id.into(),
            cache_dir: cache_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn verse_url(&self, chapter: u32, verse: u32) -> String {
        format!(
            "{}/{}/{:03}{:03}.mp3",
            self.base_url.trim_end_matches('/'),
            self.reciter_id,
            chapter,
            verse
        )
    }

    pub fn cache_path(&self, chapter: u32, verse: u32) -> PathBuf {
        self.cache_dir
            .join(format!("{}_{}_{}.mp3", self.reciter_id, chapter, verse))
    }

    async fn download(&self, chapter: u32, verse: u32, dest: &Path) -> Result<(), AudioError> {
        let fail = |reason: String| AudioError::Download { chapter, verse, reason };
        let url = self.verse_url(chapter, verse);
        logi(format!("Downloading audio for {}:{}...", chapter, verse));

        let resp = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(fail(format!("HTTP {} for {}", resp.status().as_u16(), url)));
        }
        let bytes = resp.bytes().await.map_err(|e| fail(e.to_string()))?;
        if bytes.is_empty() {
            return Err(fail(format!("empty body from {}", url)));
        }

        // Cache entries are only ever complete downloads.
        let partial = dest.with_extension("mp3.part");
        fs::write(&partial, &bytes).await?;
        fs::rename(&partial, dest).await?;
        Ok(())
    }
}

#[async_trait]
impl RecitationSource for EveryAyahSource {
    async fn fetch_segment(&self, chapter: u32, verse: u32) -> Result<AudioSegment, AudioError> {
        fs::create_dir_all(&self.cache_dir).await?;
        let path = self.cache_path(chapter, verse);
        if fs::metadata(&path).await.is_err() {
            self.download(chapter, verse, &path).await?;
        }

        let duration_secs = ffmpeg::ffprobe_duration_seconds(&path)
            .await
            .map_err(|e| AudioError::Probe {
                path: path.clone(),
                reason: format!("{:#}", e),
            })?;

        Ok(AudioSegment {
            chapter,
            verse,
            path,
            duration_secs,
        })
    }

    async fn concat(&self, segments: &[AudioSegment], out: &Path) -> Result<PathBuf, AudioError> {
        if segments.is_empty() {
            return Err(AudioError::Concat("no segments".to_string()));
        }
        fs::create_dir_all(&self.temp_dir).await?;

        let mut list = tempfile::Builder::new()
            .prefix("concat_list_")
            .suffix(".txt")
            .tempfile_in(&self.temp_dir)?;
        for segment in segments {
            let absolute = std::path::absolute(&segment.path)?;
            list.write_all(ffmpeg::concat_list_line(&absolute).as_bytes())?;
        }
        list.flush()?;

        match ffmpeg::ffmpeg_concat_audio(list.path(), out).await {
            Ok(true) => Ok(out.to_path_buf()),
            Ok(false) => Err(AudioError::Concat(format!("{} was not written", out.display()))),
            Err(e) => Err(AudioError::Concat(format!("{:#}", e))),
        }
    }
}

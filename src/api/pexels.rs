use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

pub const SEARCH_URL: &str = "https://api.pexels.com/videos/search";

#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub videos: Vec<Video>,
    #[serde(default)]
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub id: u64,
    #[serde(default)]
    pub video_files: Vec<VideoFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoFile {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub link: String,
}

impl Video {
    /// First rendition exactly `width` pixels wide.
    pub fn file_with_width(&self, width: u32) -> Option<&VideoFile> {
        self.video_files.iter().find(|f| f.width == Some(width))
    }
}

pub struct PexelsClient {
    client: Client,
    api_key: String,
}

impl PexelsClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }

    /// One page of portrait results. `Ok(None)` on a non-success status so
    /// the caller can move on to the next query.
    pub async fn search(&self, query: &str, page: u32, per_page: u32) -> Result<Option<SearchPage>> {
        let resp = self
            .client
            .get(SEARCH_URL)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query.to_string()),
                ("orientation", "portrait".to_string()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ])
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .context("Pexels request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet = body.chars().take(200).collect::<String>();
            crate::logw(format!("Pexels search '{}' HTTP {}: {}", query, status.as_u16(), snippet));
            return Ok(None);
        }

        let page = resp.json::<SearchPage>().await.context("Pexels response parse failed")?;
        Ok(Some(page))
    }

    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let bytes = self
            .client
            .get(url)
            .timeout(Duration::from_secs(600))
            .send()
            .await
            .with_context(|| format!("download request failed: {}", url))?
            .error_for_status()
            .with_context(|| format!("download refused: {}", url))?
            .bytes()
            .await
            .context("download body read failed")?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        fs::write(dest, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        Ok(bytes.len() as u64)
    }
}

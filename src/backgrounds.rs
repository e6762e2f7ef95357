//! Background footage: listing and picking local clips, and topping up the
//! folder from Pexels.

use crate::api::pexels::{PexelsClient, SearchPage};
use crate::config::Config;
use crate::ledger::{FileLedger, RangeLedger};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use rand::seq::SliceRandom;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every `.mp4` under `dir`, sorted for stable ordering.
pub fn list_backgrounds(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("backgrounds folder not found: {}", dir.display());
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let is_mp4 = entry
            .path()
            .extension()
            .and_then(OsStr::to_str)
            .map(|s| s.eq_ignore_ascii_case("mp4"))
            == Some(true);
        if entry.file_type().is_file() && is_mp4 {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}

pub fn pick_background<'a, R: Rng + ?Sized>(backgrounds: &'a [PathBuf], rng: &mut R) -> Option<&'a PathBuf> {
    backgrounds.choose(rng)
}

/// Search and download seam for stock footage.
#[async_trait]
pub trait FootageSource: Send + Sync {
    /// One page of results for `query`, or `None` when the provider refused
    /// the request.
    async fn search(&self, query: &str, page: u32, per_page: u32) -> Result<Option<SearchPage>>;

    /// Saves `url` to `dest` and returns the byte count.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

#[async_trait]
impl FootageSource for PexelsClient {
    async fn search(&self, query: &str, page: u32, per_page: u32) -> Result<Option<SearchPage>> {
        PexelsClient::search(self, query, page, per_page).await
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        PexelsClient::download(self, url, dest).await
    }
}

#[derive(Debug, Clone)]
pub struct FootageRequest<'a> {
    pub queries: &'a [String],
    pub quota: usize,
    pub per_page: u32,
    pub width: u32,
    pub dest_dir: &'a Path,
}

/// Walks result pages query by query, downloading clips whose id is not in
/// `downloaded` and that have a rendition exactly `width` wide.
///
/// Stops once `quota` clips are saved, or after a page round where no query
/// offered anything new and none reported a next page.
pub async fn fetch_new_footage<S, L>(source: &S, downloaded: &mut L, req: &FootageRequest<'_>) -> Result<usize>
where
    S: FootageSource + ?Sized,
    L: RangeLedger,
{
    let mut found = 0usize;
    let mut page = 1u32;
    'pages: while found < req.quota {
        let mut found_new_on_page = false;
        let mut more_pages = false;

        for query in req.queries {
            let Some(results) = source.search(query, page, req.per_page).await? else {
                continue;
            };
            more_pages |= results.next_page.is_some();

            for video in &results.videos {
                let id = video.id.to_string();
                if downloaded.contains(&id) {
                    continue;
                }
                let Some(file) = video.file_with_width(req.width) else {
                    continue;
                };

                found_new_on_page = true;
                let dest = req.dest_dir.join(format!("pexels_{}.mp4", id));
                logi(format!("Found new video: '{}' (ID: {})", query, id));
                match source.download(&file.link, &dest).await {
                    Ok(size) => {
                        downloaded
                            .commit(&id)
                            .await
                            .with_context(|| format!("Failed to log downloaded id {}", id))?;
                        found += 1;
                        logok(format!("Saved {} ({} bytes)", dest.display(), size));
                    }
                    Err(e) => logw(format!("Download of {} failed: {:#}", id, e)),
                }

                if found >= req.quota {
                    break 'pages;
                }
            }
        }

        page += 1;
        if !found_new_on_page && !more_pages {
            logi("No more new videos found for the current search terms.");
            break;
        }
    }
    Ok(found)
}

/// Downloads up to `pexels.videos_per_run` new portrait clips. Returns the
/// number downloaded.
pub async fn run_download(cfg: &Config, client: reqwest::Client) -> Result<usize> {
    let pexels_cfg = &cfg.pexels;
    if pexels_cfg.key.trim().is_empty() {
        anyhow::bail!("config.json: pexels.api_key missing");
    }
    if pexels_cfg.queries.is_empty() {
        anyhow::bail!("config.json: pexels.queries is empty");
    }

    let mut downloaded = FileLedger::open(cfg.paths.downloaded_ids_log()).await?;
    let pexels = PexelsClient::new(client, pexels_cfg.key.clone());
    let req = FootageRequest {
        queries: &pexels_cfg.queries,
        quota: pexels_cfg.videos_per_run,
        per_page: pexels_cfg.per_page,
        width: pexels_cfg.width,
        dest_dir: &cfg.paths.backgrounds,
    };

    logi("Searching for new background videos...");
    let found = fetch_new_footage(&pexels, &mut downloaded, &req).await?;
    logok(format!("Downloading finished: {} new videos.", found));
    Ok(found)
}

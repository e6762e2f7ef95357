use crate::ffmpeg;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub background: PathBuf,
    pub audio: PathBuf,
    pub duration_secs: f64,
    pub output: PathBuf,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RenderError(pub String);

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, job: &RenderJob) -> Result<(), RenderError>;
}

pub struct FfmpegRenderer;

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        if let Some(parent) = job.output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RenderError(format!("create {}: {}", parent.display(), e)))?;
        }
        match ffmpeg::ffmpeg_render_vertical(&job.background, &job.audio, job.duration_secs, &job.output).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(RenderError(format!("{} was not written", job.output.display()))),
            Err(e) => Err(RenderError(format!("{:#}", e))),
        }
    }
}

/// Output path for a unit, named after its final range so output from
/// different runs never collides.
pub fn output_path(output_dir: &Path, chapter: u32, start: u32, end: u32) -> PathBuf {
    output_dir.join(format!("{:03}_{:03}-{:03}.mp4", chapter, start, end))
}

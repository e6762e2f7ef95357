//! Production run: plan → validate → measure → adapt → render → commit.
//!
//! Units run strictly one after another. The ledger is owned by the pipeline
//! and mutated only in [`ProductionPipeline::produce_unit`] after a
//! successful render, so the duplicate check and the commit can never
//! interleave with another unit.

use crate::adapter::{self, DurationBounds};
use crate::api::ollama::OllamaGenerator;
use crate::audio::{AudioSegment, EveryAyahSource, RecitationSource};
use crate::backgrounds::{list_backgrounds, pick_background};
use crate::config::Config;
use crate::corpus::VerseCorpus;
use crate::error::{ProductionError, ProductionResult, Rejection, UnitError};
use crate::ledger::{FileLedger, RangeLedger};
use crate::plan::{Plan, PlanGenerator};
use crate::render::{self, FfmpegRenderer, RenderJob, Renderer};
use crate::validator;
use crate::verse::VerseRange;
use crate::{logi, logok, logw};
use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const COMBINED_AUDIO: &str = "combined_audio.mp3";

fn now_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub bounds: DurationBounds,
    pub target_units: u32,
    pub max_attempts: u32,
    pub generator_retries: u32,
    pub cooldown: Duration,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(cfg: &Config) -> ProductionResult<Self> {
        let p = &cfg.production;
        let bounds = p.bounds().ok_or_else(|| ProductionError::Config {
            message: format!(
                "duration window {}..{} is not a valid 0 < min < max range",
                p.min_duration_secs, p.max_duration_secs
            ),
        })?;
        Ok(Self {
            bounds,
            target_units: p.target_units,
            max_attempts: p.attempts(),
            generator_retries: p.generator_retries.max(1),
            cooldown: Duration::from_secs(p.cooldown_secs),
            output_dir: cfg.paths.output.clone(),
            temp_dir: cfg.paths.temp.clone(),
        })
    }
}

/// A verse with its measured recitation, kept together through trimming.
#[derive(Debug, Clone)]
struct MeasuredVerse {
    text: String,
    segment: AudioSegment,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProducedUnit {
    pub attempt: u32,
    pub key: String,
    /// Range as first proposed, before tail trimming.
    pub proposed: VerseRange,
    pub plan: Plan,
    pub chapter_name: String,
    pub verses: Vec<String>,
    pub durations: Vec<f64>,
    pub total_secs: f64,
    pub background: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub attempts: u32,
    pub produced: Vec<ProducedUnit>,
    pub skipped: BTreeMap<&'static str, u32>,
}

impl RunSummary {
    pub fn skipped_total(&self) -> u32 {
        self.skipped.values().sum()
    }
}

pub struct ProductionPipeline<G, A, R, L> {
    corpus: Arc<VerseCorpus>,
    generator: G,
    audio: A,
    renderer: R,
    ledger: L,
    backgrounds: Vec<PathBuf>,
    rng: StdRng,
    settings: PipelineSettings,
}

impl<G, A, R, L> ProductionPipeline<G, A, R, L>
where
    G: PlanGenerator,
    A: RecitationSource,
    R: Renderer,
    L: RangeLedger,
{
    pub fn new(
        corpus: Arc<VerseCorpus>,
        generator: G,
        audio: A,
        renderer: R,
        ledger: L,
        backgrounds: Vec<PathBuf>,
        settings: PipelineSettings,
    ) -> ProductionResult<Self> {
        if backgrounds.is_empty() {
            return Err(ProductionError::Config {
                message: "no background videos available".to_string(),
            });
        }
        Ok(Self {
            corpus,
            generator,
            audio,
            renderer,
            ledger,
            backgrounds,
            rng: StdRng::seed_from_u64(now_seed()),
            settings,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Runs attempts until `target_units` are produced or `max_attempts` are
    /// spent. Only a [`ProductionError`] stops the run early.
    pub async fn run(&mut self) -> ProductionResult<RunSummary> {
        let mut summary = RunSummary::default();
        let attempts = self.settings.max_attempts;
        let target = self.settings.target_units as usize;

        for attempt in 1..=attempts {
            if summary.produced.len() >= target {
                break;
            }
            summary.attempts = attempt;
            logi(format!("--- Starting video {}/{} ---", attempt, attempts));

            match self.produce_unit(attempt).await {
                Ok(unit) => {
                    logok(format!(
                        "Produced {} ({:.1}s) -> {}",
                        unit.key,
                        unit.total_secs,
                        unit.output.display()
                    ));
                    summary.produced.push(unit);
                    if !self.settings.cooldown.is_zero() && summary.produced.len() < target {
                        logi("Pausing for a moment...");
                        tokio::time::sleep(self.settings.cooldown).await;
                    }
                }
                Err(UnitError::Skipped(rejection)) => {
                    let range = rejection.subject().unwrap_or_else(|| "-".to_string());
                    warn!(kind = rejection.kind(), range = %range, attempt, "unit skipped: {}", rejection);
                    *summary.skipped.entry(rejection.kind()).or_default() += 1;
                }
                Err(UnitError::Fatal(err)) => {
                    warn!(attempt, "run halted: {}", err);
                    return Err(err);
                }
            }
        }

        info!(
            attempts = summary.attempts,
            produced = summary.produced.len(),
            skipped = summary.skipped_total(),
            skipped_by_kind = ?summary.skipped,
            "production run complete"
        );
        Ok(summary)
    }

    /// Takes one unit from plan to committed output.
    pub async fn produce_unit(&mut self, attempt: u32) -> Result<ProducedUnit, UnitError> {
        let plan = self.request_plan().await?;
        let proposed = plan.range;

        let validated = validator::validate(proposed, &self.corpus, &self.ledger)?;
        logi(format!(
            "Plan {} validated: {} ({} verses)",
            proposed,
            validated.chapter_name,
            validated.verses.len()
        ));

        let measured = self.measure(proposed, validated.verses).await?;
        let durations: Vec<f64> = measured.iter().map(|m| m.segment.duration_secs).collect();

        let adapted = adapter::adapt(proposed, &measured, &durations, self.settings.bounds)?;
        let range = adapted.range;
        if range != proposed {
            logi(format!(
                "Trimmed {} -> {}: dropped {} verses ({:.1}s)",
                proposed,
                range,
                adapted.trimmed_from(&proposed),
                adapted.total_secs
            ));
        } else {
            logi(format!("Plan fits: {:.1}s", adapted.total_secs));
        }

        let segments: Vec<AudioSegment> = adapted.items.iter().map(|m| m.segment.clone()).collect();
        let combined = self.settings.temp_dir.join(COMBINED_AUDIO);
        let audio = self
            .audio
            .concat(&segments, &combined)
            .await
            .map_err(|e| Rejection::AudioFetchFailure {
                range,
                reason: e.to_string(),
            })?;

        let background = pick_background(&self.backgrounds, &mut self.rng)
            .cloned()
            .ok_or_else(|| Rejection::RenderFailure {
                range,
                reason: "no background videos available".to_string(),
            })?;
        logi(format!("Using background: {}", background.display()));

        let job = RenderJob {
            background: background.clone(),
            audio,
            duration_secs: adapted.total_secs,
            output: render::output_path(&self.settings.output_dir, range.chapter(), range.start(), range.end()),
        };
        self.renderer
            .render(&job)
            .await
            .map_err(|e| Rejection::RenderFailure {
                range,
                reason: e.to_string(),
            })?;

        let key = range.key();
        self.ledger
            .commit(&key)
            .await
            .map_err(|source| ProductionError::Ledger {
                key: key.clone(),
                source,
            })?;

        let unit = ProducedUnit {
            attempt,
            key,
            proposed,
            plan: Plan { range, ..plan },
            chapter_name: validated.chapter_name,
            verses: adapted.items.into_iter().map(|m| m.text).collect(),
            durations: adapted.durations,
            total_secs: adapted.total_secs,
            background,
            output: job.output,
        };
        write_sidecar(&unit).await;
        Ok(unit)
    }

    /// Asks the generator for a plan whose key is not in the ledger,
    /// retrying up to `generator_retries` times on duplicates.
    async fn request_plan(&self) -> Result<Plan, UnitError> {
        let excluded = self.ledger.snapshot();
        let retries = self.settings.generator_retries;

        for attempt in 1..=retries {
            let proposal = self
                .generator
                .request_plan(&excluded)
                .await
                .map_err(Rejection::from)?;
            let plan = proposal.into_plan()?;

            let key = plan.range.key();
            if !self.ledger.contains(&key) {
                return Ok(plan);
            }
            logw(format!(
                "Generator suggested a used range ({}), asking again ({}/{})",
                key, attempt, retries
            ));
        }

        Err(ProductionError::GeneratorExhausted { attempts: retries }.into())
    }

    async fn measure(&self, range: VerseRange, texts: Vec<String>) -> Result<Vec<MeasuredVerse>, Rejection> {
        let mut measured = Vec::with_capacity(texts.len());
        for (verse, text) in range.verses().zip(texts) {
            let segment = self
                .audio
                .fetch_segment(range.chapter(), verse)
                .await
                .map_err(|e| Rejection::AudioFetchFailure {
                    range,
                    reason: e.to_string(),
                })?;
            if !(segment.duration_secs.is_finite() && segment.duration_secs > 0.0) {
                return Err(Rejection::AudioFetchFailure {
                    range,
                    reason: format!(
                        "verse {}:{} has unusable duration {}",
                        range.chapter(),
                        verse,
                        segment.duration_secs
                    ),
                });
            }
            measured.push(MeasuredVerse { text, segment });
        }
        logok(format!("Audio gathered for {} ({} verses)", range, measured.len()));
        Ok(measured)
    }
}

/// Wires the real collaborators from `cfg` and runs one production pass.
pub async fn run_production(cfg: &Config) -> anyhow::Result<RunSummary> {
    let settings = PipelineSettings::from_config(cfg)?;
    let corpus = Arc::new(VerseCorpus::load(&cfg.paths.corpus).await?);
    logok(format!(
        "Loaded corpus: {} ({} chapters)",
        cfg.paths.corpus.display(),
        corpus.chapter_count()
    ));

    let ledger = FileLedger::open(cfg.paths.used_verses_log()).await?;
    logi(format!("Ledger {}: {} ranges already used", ledger.path().display(), ledger.len()));
    let unreadable = non_canonical_keys(&ledger.snapshot());
    if unreadable > 0 {
        logw(format!(
            "{} ledger lines are not chapter:start-end keys; they block nothing",
            unreadable
        ));
    }

    let backgrounds = list_backgrounds(&cfg.paths.backgrounds)?;
    if backgrounds.is_empty() {
        anyhow::bail!(
            "The '{}' folder has no .mp4 files. Add videos or run the backgrounds command.",
            cfg.paths.backgrounds.display()
        );
    }
    logi(format!("{} background videos available", backgrounds.len()));

    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let generator = OllamaGenerator::new(client.clone(), &cfg.ollama, &cfg.production);
    let audio = EveryAyahSource::new(
        client,
        cfg.recitation.base_url.clone(),
        cfg.recitation.reciter_id(),
        cfg.paths.audio_cache(),
        cfg.paths.temp.clone(),
    );
    logi(format!("Reciter: {} ({})", cfg.recitation.reciter, cfg.recitation.reciter_id()));

    let mut pipeline = ProductionPipeline::new(
        corpus,
        generator,
        audio,
        FfmpegRenderer,
        ledger,
        backgrounds,
        settings,
    )?;
    let summary = pipeline.run().await?;

    logok(format!(
        "Production run complete: created {} videos in '{}' ({} attempts, {} skipped)",
        summary.produced.len(),
        cfg.paths.output.display(),
        summary.attempts,
        summary.skipped_total()
    ));
    Ok(summary)
}

/// Ledger lines that no produced range could ever match.
fn non_canonical_keys(keys: &[String]) -> usize {
    keys.iter()
        .filter(|key| match key.parse::<VerseRange>() {
            Ok(range) => range.key() != key.as_str(),
            Err(_) => true,
        })
        .count()
}

/// Writes title, tags and timing next to the video for publishing.
async fn write_sidecar(unit: &ProducedUnit) {
    let path = unit.output.with_extension("json");
    let body = match serde_json::to_vec_pretty(unit) {
        Ok(body) => body,
        Err(e) => {
            logw(format!("Could not encode metadata for {}: {}", unit.key, e));
            return;
        }
    };
    if let Err(e) = tokio::fs::write(&path, body).await {
        logw(format!("Could not write {}: {}", path.display(), e));
    }
}

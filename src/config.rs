use crate::adapter::DurationBounds;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Reciter display names and their EveryAyah folder ids.
pub const RECITERS: &[(&str, &str)] = &[
    ("Alafasy", "Alafasy_128kbps"),
    ("Al-Husary", "Husary_128kbps"),
    ("Al-Minshawi", "Minshawy_Mujawwad_192kbps"),
    ("Basfar", "Abdullah_Basfar_192kbps"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub production: ProductionConfig,
    pub paths: PathsConfig,
    pub ollama: OllamaConfig,
    pub recitation: RecitationConfig,
    pub pexels: PexelsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    pub target_units: u32,
    /// Attempts per run; `None` means one attempt per target unit.
    pub max_attempts: Option<u32>,
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    pub generator_retries: u32,
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub corpus: PathBuf,
    pub backgrounds: PathBuf,
    pub output: PathBuf,
    pub logs: PathBuf,
    pub temp: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_excluded_in_prompt: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecitationConfig {
    pub reciter: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PexelsConfig {
    #[serde(rename = "api_key")]
    pub key: String,
    pub queries: Vec<String>,
    pub videos_per_run: usize,
    pub per_page: u32,
    pub width: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "ayah_shorts=debug,warn".
    pub level: String,
    pub json: bool,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            target_units: 100,
            max_attempts: None,
            min_duration_secs: 7.0,
            max_duration_secs: 30.0,
            generator_retries: 5,
            cooldown_secs: 2,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from("data/quran-uthmani.xml"),
            backgrounds: PathBuf::from("backgrounds"),
            output: PathBuf::from("output"),
            logs: PathBuf::from("logs"),
            temp: PathBuf::from("temp"),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/generate".to_string(),
            model: "qwen3:8b".to_string(),
            timeout_secs: 600,
            max_excluded_in_prompt: 200,
        }
    }
}

impl Default for RecitationConfig {
    fn default() -> Self {
        Self {
            reciter: "Alafasy".to_string(),
            base_url: "https://everyayah.com/data".to_string(),
        }
    }
}

impl Default for PexelsConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            queries: ["Islam", "muslims", "mosque", "kaaba"]
                .into_iter()
                .map(String::from)
                .collect(),
            videos_per_run: 100,
            per_page: 20,
            width: 1080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ProductionConfig {
    pub fn bounds(&self) -> Option<DurationBounds> {
        DurationBounds::new(self.min_duration_secs, self.max_duration_secs)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(self.target_units)
    }
}

impl PathsConfig {
    pub fn used_verses_log(&self) -> PathBuf {
        self.logs.join("used_verses.txt")
    }

    pub fn downloaded_ids_log(&self) -> PathBuf {
        self.logs.join("downloaded_ids.txt")
    }

    pub fn audio_cache(&self) -> PathBuf {
        self.temp.join("audio_cache")
    }
}

impl RecitationConfig {
    /// EveryAyah folder id for the configured reciter. Unknown names are
    /// used verbatim so any published folder can be selected.
    pub fn reciter_id(&self) -> &str {
        RECITERS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.reciter))
            .map(|(_, id)| *id)
            .unwrap_or(self.reciter.as_str())
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Invalid config: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to defaults.
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if fs::metadata(&path).await.is_ok() {
            return Self::load(path).await;
        }
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.production;
        if p.bounds().is_none() {
            anyhow::bail!(
                "config.json: production duration window invalid (min {} / max {}); need 0 < min < max",
                p.min_duration_secs,
                p.max_duration_secs
            );
        }
        if p.target_units == 0 {
            anyhow::bail!("config.json: production.target_units must be at least 1");
        }
        if p.generator_retries == 0 {
            anyhow::bail!("config.json: production.generator_retries must be at least 1");
        }
        if self.recitation.reciter.trim().is_empty() {
            anyhow::bail!("config.json: recitation.reciter missing");
        }
        Ok(())
    }
}

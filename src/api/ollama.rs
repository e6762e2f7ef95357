use crate::config::{OllamaConfig, ProductionConfig};
use crate::plan::{GeneratorError, PlanGenerator, PlanProposal};
use crate::{logi, logw};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const PROMPT_HEAD: &str = r#"You are a poetic storyteller and a student of Qur'anic Tafsir (exegesis). Your mission is to unearth profound, visually striking, or deeply emotional themes from the Qur'an that would captivate a social media audience. Avoid simple, overused one-word themes.

For your next video, generate a unique concept by following these steps:
1. Identify a theme that is either a powerful story, a stunning visual from nature, or a deep human emotion described in the Qur'an.
2. Find 1 to 4 consecutive verses that are the heart of this theme.
3. Provide the Surah number, start Ayah, and end Ayah for these verses.
4. Craft a short, poetic, and engaging TikTok title in Arabic.
5. Generate 8 relevant Arabic hashtags that capture the essence of the video."#;

const PROMPT_TAIL: &str = r##"Your final output MUST be a single, clean JSON object, with no other text before or after.
Example format:
{
  "theme": "The story of the companions of the cave (Ashab al-Kahf)",
  "surah": 18,
  "start_ayah": 13,
  "end_ayah": 14,
  "title": "قصة الفتية الذين آمنوا بربهم وزدناهم هدى",
  "hashtags": ["#الكهف", "#قصص_القران", "#قران", "#ثبات", "#تلاوة_خاشعة", "#islamic", "#quran", "#تلاوة"]
}"##;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

/// Plan generator backed by a local Ollama `/api/generate` endpoint.
pub struct OllamaGenerator {
    client: Client,
    url: String,
    model: String,
    timeout: Duration,
    max_excluded: usize,
    min_secs: f64,
    max_secs: f64,
}

impl OllamaGenerator {
    pub fn new(client: Client, cfg: &OllamaConfig, production: &ProductionConfig) -> Self {
        Self {
            client,
            url: cfg.url.clone(),
            model: cfg.model.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            max_excluded: cfg.max_excluded_in_prompt,
            min_secs: production.min_duration_secs,
            max_secs: production.max_duration_secs,
        }
    }

    fn build_prompt(&self, excluded: &[String]) -> String {
        let mut prompt = format!(
            "{}\n6. The recitation must last between {:.0} and {:.0} seconds without any cuts in the ayat.\n\n",
            PROMPT_HEAD, self.min_secs, self.max_secs
        );

        prompt.push_str("VERY IMPORTANT: Do not use any verses you have been asked about before. Be unique every time.\n");
        let recent = &excluded[excluded.len().saturating_sub(self.max_excluded)..];
        if !recent.is_empty() {
            prompt.push_str("These ranges (surah:start-end) are already used and are forbidden:\n");
            prompt.push_str(&recent.join(", "));
            prompt.push('\n');
        }
        prompt.push('\n');
        prompt.push_str(PROMPT_TAIL);
        prompt
    }
}

/// Pulls the plan object out of the model text. Some models wrap JSON in
/// prose or code fences despite `format: json`.
fn extract_plan(text: &str) -> Option<PlanProposal> {
    if let Ok(plan) = PlanProposal::from_json(text) {
        return Some(plan);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    PlanProposal::from_json(&text[start..=end]).ok()
}

#[async_trait]
impl PlanGenerator for OllamaGenerator {
    async fn request_plan(&self, excluded: &[String]) -> Result<PlanProposal, GeneratorError> {
        let body = json!({
            "model": self.model,
            "format": "json",
            "prompt": self.build_prompt(excluded),
            "stream": false,
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                GeneratorError::Unavailable(format!("could not connect to Ollama at {}: {}", self.url, e))
            })?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let snippet = raw.chars().take(400).collect::<String>();
            logw(format!("Ollama HTTP {}: {}", status.as_u16(), snippet));
            return Err(GeneratorError::Unavailable(format!("HTTP {}", status.as_u16())));
        }

        let envelope: GenerateResponse = serde_json::from_str(&raw)
            .map_err(|e| GeneratorError::Malformed(format!("bad Ollama envelope: {}", e)))?;
        if let Some(err) = envelope.error {
            return Err(GeneratorError::Unavailable(err));
        }

        let plan = extract_plan(&envelope.response).ok_or_else(|| {
            let snippet = envelope.response.chars().take(400).collect::<String>();
            GeneratorError::Malformed(format!("no plan object in model output: {}", snippet))
        })?;
        logi(format!("Plan received: {} ({})", plan.label(), plan.theme));
        Ok(plan)
    }
}

use crate::error::Rejection;
use crate::verse::VerseRange;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Plan exactly as the generator returned it. Indices are signed so that
/// nonsense like `0` or `-3` parses and can be rejected with a reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanProposal {
    #[serde(default)]
    pub theme: String,
    #[serde(alias = "chapter")]
    pub surah: i64,
    #[serde(alias = "start_verse", alias = "start")]
    pub start_ayah: i64,
    #[serde(alias = "end_verse", alias = "end")]
    pub end_ayah: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "tags")]
    pub hashtags: Vec<String>,
}

impl PlanProposal {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text.trim()).with_context(|| "Failed to parse plan JSON")
    }

    /// Raw `chapter:start-end` label for logging before a range exists.
    pub fn label(&self) -> String {
        format!("{}:{}-{}", self.surah, self.start_ayah, self.end_ayah)
    }

    pub fn into_plan(self) -> Result<Plan, Rejection> {
        let range = VerseRange::from_raw(self.surah, self.start_ayah, self.end_ayah).map_err(|err| {
            Rejection::MalformedPlan {
                reason: format!("{} ({})", err, self.label()),
                proposal: Some(self.label()),
            }
        })?;
        Ok(Plan {
            range,
            title: self.title,
            tags: self.hashtags,
            theme: self.theme,
        })
    }
}

/// Candidate unit. `title`, `tags` and `theme` are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub range: VerseRange,
    pub title: String,
    pub tags: Vec<String>,
    pub theme: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GeneratorError {
    #[error("generator unreachable: {0}")]
    Unavailable(String),
    #[error("generator returned an unusable plan: {0}")]
    Malformed(String),
}

impl From<GeneratorError> for Rejection {
    fn from(err: GeneratorError) -> Self {
        match err {
            GeneratorError::Unavailable(reason) => Rejection::GeneratorUnavailable { reason },
            GeneratorError::Malformed(reason) => Rejection::MalformedPlan { reason, proposal: None },
        }
    }
}

/// Source of candidate plans. `excluded` lists keys already produced; an
/// implementation may still return one of them.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn request_plan(&self, excluded: &[String]) -> Result<PlanProposal, GeneratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_output() {
        let json = r##"{
            "theme": "The companions of the cave",
            "surah": 18,
            "start_ayah": 13,
            "end_ayah": 14,
            "title": "قصة الفتية",
            "hashtags": ["#الكهف", "#quran"]
        }"##;
        let plan = PlanProposal::from_json(json).unwrap().into_plan().unwrap();
        assert_eq!(plan.range.key(), "18:13-14");
        assert_eq!(plan.tags.len(), 2);
        assert_eq!(plan.theme, "The companions of the cave");
    }

    #[test]
    fn accepts_alternate_field_names() {
        let json = r#"{"chapter": 1, "start_verse": 1, "end_verse": 7, "tags": []}"#;
        let plan = PlanProposal::from_json(json).unwrap().into_plan().unwrap();
        assert_eq!(plan.range.key(), "1:1-7");
        assert!(plan.title.is_empty());
    }

    #[test]
    fn impossible_indices_are_malformed() {
        let json = r#"{"surah": 2, "start_ayah": 5, "end_ayah": 3}"#;
        let err = PlanProposal::from_json(json).unwrap().into_plan().unwrap_err();
        assert_eq!(err.kind(), "malformed_plan");
        assert!(err.to_string().contains("2:5-3"));
        assert_eq!(err.subject().as_deref(), Some("2:5-3"));
    }

    #[test]
    fn huge_end_still_forms_a_range() {
        let json = r#"{"surah": 2, "start_ayah": 1, "end_ayah": 5000000000}"#;
        let plan = PlanProposal::from_json(json).unwrap().into_plan().unwrap();
        assert_eq!(plan.range.end(), u32::MAX);
    }

    #[test]
    fn missing_indices_fail_to_parse() {
        assert!(PlanProposal::from_json(r#"{"theme": "x"}"#).is_err());
        assert!(PlanProposal::from_json("not json").is_err());
    }
}

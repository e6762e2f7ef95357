//! Error taxonomy for a production run.
//!
//! [`Rejection`] ends the current unit only; the run loop logs it and moves
//! on to the next attempt. [`ProductionError`] ends the whole run.

use crate::verse::VerseRange;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    /// `proposal` is the raw `chapter:start-end` label when the generator
    /// returned indices at all.
    #[error("generated plan is malformed: {reason}")]
    MalformedPlan { reason: String, proposal: Option<String> },

    #[error("plan generator unavailable: {reason}")]
    GeneratorUnavailable { reason: String },

    #[error("chapter {} of {range} does not exist in the corpus", range.chapter())]
    UnknownChapter { range: VerseRange },

    #[error("{range} ends at verse {end} but chapter {chapter} has only {verse_count} verses")]
    VerseOutOfRange {
        range: VerseRange,
        chapter: u32,
        end: u32,
        verse_count: usize,
    },

    #[error("{range} was already produced")]
    DuplicateRange { range: VerseRange },

    #[error("corpus has no text for {}:{verse} in {range}", range.chapter())]
    CorpusGap { range: VerseRange, verse: u32 },

    #[error("{range} lasts {total:.1}s after trimming, below the {min:.1}s minimum")]
    TooShort {
        range: VerseRange,
        total: f64,
        min: f64,
    },

    #[error("recitation audio for {range} unavailable: {reason}")]
    AudioFetchFailure { range: VerseRange, reason: String },

    #[error("render of {range} failed: {reason}")]
    RenderFailure { range: VerseRange, reason: String },
}

impl Rejection {
    /// Stable name used as the `kind` log field and in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::MalformedPlan { .. } => "malformed_plan",
            Rejection::GeneratorUnavailable { .. } => "generator_unavailable",
            Rejection::UnknownChapter { .. } => "unknown_chapter",
            Rejection::VerseOutOfRange { .. } => "verse_out_of_range",
            Rejection::DuplicateRange { .. } => "duplicate_range",
            Rejection::CorpusGap { .. } => "corpus_gap",
            Rejection::TooShort { .. } => "too_short",
            Rejection::AudioFetchFailure { .. } => "audio_fetch_failure",
            Rejection::RenderFailure { .. } => "render_failure",
        }
    }

    /// The range under consideration when the unit was rejected, if one
    /// had been formed.
    pub fn range(&self) -> Option<VerseRange> {
        match self {
            Rejection::MalformedPlan { .. } | Rejection::GeneratorUnavailable { .. } => None,
            Rejection::UnknownChapter { range }
            | Rejection::VerseOutOfRange { range, .. }
            | Rejection::DuplicateRange { range }
            | Rejection::CorpusGap { range, .. }
            | Rejection::TooShort { range, .. }
            | Rejection::AudioFetchFailure { range, .. }
            | Rejection::RenderFailure { range, .. } => Some(*range),
        }
    }

    /// What to log as the offending range: the formed range, or the raw
    /// proposal label for a plan that never became one.
    pub fn subject(&self) -> Option<String> {
        match self {
            Rejection::MalformedPlan { proposal, .. } => proposal.clone(),
            other => other.range().map(|r| r.key()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProductionError {
    #[error("plan generator returned only already-used ranges after {attempts} attempts")]
    GeneratorExhausted { attempts: u32 },

    #[error("failed to commit {key} to the ledger: {source}")]
    Ledger {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {message}")]
    Config { message: String },
}

pub type ProductionResult<T> = Result<T, ProductionError>;

/// Outcome of one unit that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error(transparent)]
    Skipped(#[from] Rejection),

    #[error(transparent)]
    Fatal(#[from] ProductionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct() {
        let range = VerseRange::new(1, 1, 2).unwrap();
        let all = [
            Rejection::MalformedPlan {
                reason: String::new(),
                proposal: None,
            },
            Rejection::GeneratorUnavailable { reason: String::new() },
            Rejection::UnknownChapter { range },
            Rejection::VerseOutOfRange {
                range,
                chapter: 1,
                end: 2,
                verse_count: 1,
            },
            Rejection::DuplicateRange { range },
            Rejection::CorpusGap { range, verse: 2 },
            Rejection::TooShort {
                range,
                total: 1.0,
                min: 7.0,
            },
            Rejection::AudioFetchFailure {
                range,
                reason: String::new(),
            },
            Rejection::RenderFailure {
                range,
                reason: String::new(),
            },
        ];
        let mut kinds: Vec<_> = all.iter().map(Rejection::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), all.len());
        assert_eq!(all.iter().filter(|r| r.range().is_none()).count(), 2);
    }

    #[test]
    fn subject_falls_back_to_raw_proposal() {
        let malformed = Rejection::MalformedPlan {
            reason: "start verse must be positive (got 0)".into(),
            proposal: Some("2:0-3".into()),
        };
        assert_eq!(malformed.range(), None);
        assert_eq!(malformed.subject().as_deref(), Some("2:0-3"));

        let unavailable = Rejection::GeneratorUnavailable { reason: "refused".into() };
        assert_eq!(unavailable.subject(), None);

        let range = VerseRange::new(36, 1, 4).unwrap();
        assert_eq!(
            Rejection::DuplicateRange { range }.subject().as_deref(),
            Some("36:1-4")
        );
    }

    #[test]
    fn out_of_range_message_names_the_bound() {
        let range = VerseRange::new(112, 2, 8).unwrap();
        let err = Rejection::VerseOutOfRange {
            range,
            chapter: 112,
            end: 8,
            verse_count: 4,
        };
        assert_eq!(
            err.to_string(),
            "112:2-8 ends at verse 8 but chapter 112 has only 4 verses"
        );
    }
}

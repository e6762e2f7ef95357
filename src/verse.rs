use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A contiguous span of verses inside one chapter.
///
/// Construction guarantees `chapter >= 1`, `start >= 1` and `end >= start`.
/// Whether the span fits inside its chapter is checked later against the
/// corpus, since only the corpus knows the chapter length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VerseRange {
    chapter: u32,
    start: u32,
    end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("chapter index must be positive (got {0})")]
    Chapter(i64),
    #[error("start verse must be positive (got {0})")]
    Start(i64),
    #[error("end verse {end} precedes start verse {start}")]
    Inverted { start: i64, end: i64 },
    #[error("malformed range key: {0:?}")]
    Key(String),
}

/// Positive indices past `u32::MAX` clamp to it; no chapter is that long, so
/// the corpus check still rejects them as out of range.
fn to_index(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl VerseRange {
    pub fn new(chapter: u32, start: u32, end: u32) -> Result<Self, RangeError> {
        Self::from_raw(chapter.into(), start.into(), end.into())
    }

    /// Builds a range from untrusted signed integers, as they arrive from a
    /// generated plan.
    pub fn from_raw(chapter: i64, start: i64, end: i64) -> Result<Self, RangeError> {
        if chapter < 1 {
            return Err(RangeError::Chapter(chapter));
        }
        if start < 1 {
            return Err(RangeError::Start(start));
        }
        if end < start {
            return Err(RangeError::Inverted { start, end });
        }
        Ok(Self {
            chapter: to_index(chapter),
            start: to_index(start),
            end: to_index(end),
        })
    }

    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of verses covered; never zero.
    pub fn verse_count(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn verses(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    /// Same chapter and start, new end. Used after tail trimming.
    pub fn with_end(&self, end: u32) -> Result<Self, RangeError> {
        Self::new(self.chapter, self.start, end)
    }

    /// Canonical ledger key, `"{chapter}:{start}-{end}"`.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for VerseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chapter, self.start, self.end)
    }
}

impl FromStr for VerseRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || RangeError::Key(s.to_string());
        let (chapter, span) = s.trim().split_once(':').ok_or_else(bad)?;
        let (start, end) = span.split_once('-').ok_or_else(bad)?;
        let parse = |v: &str| v.trim().parse::<i64>().map_err(|_| bad());
        Self::from_raw(parse(chapter)?, parse(start)?, parse(end)?)
    }
}

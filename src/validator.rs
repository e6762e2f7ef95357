//! Gate between generated plans and the rest of the pipeline.
//!
//! Generated ranges are untrusted: the chapter may not exist and the end
//! verse may lie beyond the chapter. Nothing downstream runs on a range that
//! has not passed [`validate`].

use crate::corpus::VerseCorpus;
use crate::error::Rejection;
use crate::ledger::RangeLedger;
use crate::verse::VerseRange;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRange {
    pub range: VerseRange,
    pub chapter_name: String,
    /// One non-empty text per verse in `range`, in order.
    pub verses: Vec<String>,
}

pub fn validate<L>(candidate: VerseRange, corpus: &VerseCorpus, ledger: &L) -> Result<ValidatedRange, Rejection>
where
    L: RangeLedger + ?Sized,
{
    let chapter = corpus
        .chapter(candidate.chapter())
        .ok_or(Rejection::UnknownChapter { range: candidate })?;

    let verse_count = chapter.verse_count();
    if candidate.end() as usize > verse_count {
        return Err(Rejection::VerseOutOfRange {
            range: candidate,
            chapter: candidate.chapter(),
            end: candidate.end(),
            verse_count,
        });
    }

    if ledger.contains(&candidate.key()) {
        return Err(Rejection::DuplicateRange { range: candidate });
    }

    let verses = candidate
        .verses()
        .map(|verse| {
            chapter
                .verse(verse)
                .map(str::to_string)
                .ok_or(Rejection::CorpusGap {
                    range: candidate,
                    verse,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedRange {
        range: candidate,
        chapter_name: chapter.name.clone(),
        verses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Chapter;
    use crate::ledger::MemoryLedger;
    use std::collections::BTreeMap;

    fn chapter(index: u32, count: u32) -> Chapter {
        let verses: BTreeMap<u32, String> = (1..=count).map(|v| (v, format!("verse {index}:{v}"))).collect();
        Chapter::new(index, format!("chapter {index}"), verses)
    }

    fn corpus() -> VerseCorpus {
        VerseCorpus::from_chapters([chapter(1, 7), chapter(112, 5)])
    }

    fn range(c: u32, s: u32, e: u32) -> VerseRange {
        VerseRange::new(c, s, e).unwrap()
    }

    #[test]
    fn accepts_range_inside_chapter() {
        let ok = validate(range(1, 2, 4), &corpus(), &MemoryLedger::new()).unwrap();
        assert_eq!(ok.chapter_name, "chapter 1");
        assert_eq!(ok.verses, vec!["verse 1:2", "verse 1:3", "verse 1:4"]);
        assert_eq!(ok.verses.len(), ok.range.verse_count());
    }

    #[test]
    fn accepts_whole_chapter() {
        let ok = validate(range(112, 1, 5), &corpus(), &MemoryLedger::new()).unwrap();
        assert_eq!(ok.verses.len(), 5);
    }

    #[test]
    fn rejects_unknown_chapter() {
        let err = validate(range(2, 1, 1), &corpus(), &MemoryLedger::new()).unwrap_err();
        assert_eq!(err, Rejection::UnknownChapter { range: range(2, 1, 1) });
    }

    #[test]
    fn rejects_end_past_chapter() {
        let err = validate(range(112, 2, 8), &corpus(), &MemoryLedger::new()).unwrap_err();
        assert!(matches!(
            err,
            Rejection::VerseOutOfRange { end: 8, verse_count: 5, .. }
        ));
    }

    #[test]
    fn rejects_used_range_every_time() {
        let ledger = MemoryLedger::with_keys(["1:1-3"]);
        for _ in 0..2 {
            let err = validate(range(1, 1, 3), &corpus(), &ledger).unwrap_err();
            assert_eq!(err, Rejection::DuplicateRange { range: range(1, 1, 3) });
        }
        assert!(validate(range(1, 1, 4), &corpus(), &ledger).is_ok());
    }

    #[test]
    fn bounds_check_wins_over_duplicate() {
        let ledger = MemoryLedger::with_keys(["112:1-9"]);
        let err = validate(range(112, 1, 9), &corpus(), &ledger).unwrap_err();
        assert_eq!(err.kind(), "verse_out_of_range");
    }

    #[test]
    fn reports_gap_inside_chapter() {
        let mut verses: BTreeMap<u32, String> = (1..=4).map(|v| (v, format!("v{v}"))).collect();
        verses.insert(3, "   ".to_string());
        let corpus = VerseCorpus::from_chapters([Chapter::new(9, "gappy", verses)]);
        let err = validate(range(9, 2, 4), &corpus, &MemoryLedger::new()).unwrap_err();
        assert_eq!(err, Rejection::CorpusGap { range: range(9, 2, 4), verse: 3 });
    }

    #[test]
    fn ok_iff_absent_and_in_bounds() {
        let corpus = corpus();
        let ledger = MemoryLedger::with_keys(["1:2-3", "1:7-7", "112:1-5"]);
        for start in 1..=9 {
            for end in start..=9 {
                let candidate = range(1, start, end);
                let expected = end <= 7 && !ledger.contains(&candidate.key());
                assert_eq!(
                    validate(candidate, &corpus, &ledger).is_ok(),
                    expected,
                    "{candidate}"
                );
            }
        }
    }
}

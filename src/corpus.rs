//! Read-only verse corpus loaded from a Tanzil-style XML file:
//!
//! ```text
//! <quran>
//!   <sura index="1" name="...">
//!     <aya index="1" text="..."/>
//!   </sura>
//! </quran>
//! ```

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::fs;

static SURA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<sura\b([^>]*)>(.*?)</sura>").expect("sura regex"));
static AYA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<aya\b([^>]*?)/?>").expect("aya regex"));
static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("attr regex"));

#[derive(Debug, Clone)]
pub struct Chapter {
    pub index: u32,
    pub name: String,
    verses: BTreeMap<u32, String>,
}

impl Chapter {
    pub fn new(index: u32, name: impl Into<String>, verses: BTreeMap<u32, String>) -> Self {
        Self {
            index,
            name: name.into(),
            verses,
        }
    }

    /// Number of verse entries in the chapter.
    pub fn verse_count(&self) -> usize {
        self.verses.len()
    }

    /// Text of a verse; `None` when the entry is missing or blank.
    pub fn verse(&self, index: u32) -> Option<&str> {
        self.verses
            .get(&index)
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerseCorpus {
    chapters: HashMap<u32, Chapter>,
}

impl VerseCorpus {
    pub fn from_chapters(chapters: impl IntoIterator<Item = Chapter>) -> Self {
        Self {
            chapters: chapters.into_iter().map(|c| (c.index, c)).collect(),
        }
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read corpus: {}", path.as_ref().display()))?;
        let corpus = Self::from_xml(&text)
            .with_context(|| format!("Failed to parse corpus: {}", path.as_ref().display()))?;
        Ok(corpus)
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut chapters = Vec::new();
        for sura in SURA_RE.captures_iter(xml) {
            let attrs = parse_attrs(&sura[1]);
            let index = attrs
                .get("index")
                .and_then(|v| v.parse::<u32>().ok())
                .context("sura element without a numeric index")?;
            let name = attrs.get("name").cloned().unwrap_or_default();

            let mut verses = BTreeMap::new();
            for aya in AYA_RE.captures_iter(&sura[2]) {
                let attrs = parse_attrs(&aya[1]);
                let Some(verse) = attrs.get("index").and_then(|v| v.parse::<u32>().ok()) else {
                    anyhow::bail!("aya without a numeric index in sura {}", index);
                };
                verses.insert(verse, attrs.get("text").cloned().unwrap_or_default());
            }
            chapters.push(Chapter::new(index, name, verses));
        }

        if chapters.is_empty() {
            anyhow::bail!("no sura elements found");
        }
        Ok(Self::from_chapters(chapters))
    }

    pub fn chapter(&self, index: u32) -> Option<&Chapter> {
        self.chapters.get(&index)
    }

    pub fn verse_text(&self, chapter: u32, verse: u32) -> Option<&str> {
        self.chapter(chapter)?.verse(verse)
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }
}

fn parse_attrs(raw: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(raw)
        .map(|cap| {
            let value = cap.get(2).or_else(|| cap.get(3)).map_or("", |m| m.as_str());
            (cap[1].to_string(), unescape_xml(value))
        })
        .collect()
}

fn unescape_xml(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<quran>
	<sura index="1" name="الفاتحة">
		<aya index="1" text="بسم الله الرحمن الرحيم" />
		<aya index="2" text="الحمد لله رب العالمين" />
	</sura>
	<sura index="112" name='الإخلاص'>
		<aya index="1" text="قل هو الله أحد" bismillah="بسم الله الرحمن الرحيم" />
		<aya index="2" text="A &amp; B &#x41;&#66;" />
		<aya index="3" text="" />
	</sura>
</quran>
"#;

    #[test]
    fn parses_chapters_and_verses() {
        let corpus = VerseCorpus::from_xml(SAMPLE).unwrap();
        assert_eq!(corpus.chapter_count(), 2);

        let fatiha = corpus.chapter(1).unwrap();
        assert_eq!(fatiha.name, "الفاتحة");
        assert_eq!(fatiha.verse_count(), 2);
        assert_eq!(corpus.verse_text(1, 2), Some("الحمد لله رب العالمين"));
        assert_eq!(corpus.chapter(112).unwrap().name, "الإخلاص");
    }

    #[test]
    fn decodes_entities() {
        let corpus = VerseCorpus::from_xml(SAMPLE).unwrap();
        assert_eq!(corpus.verse_text(112, 2), Some("A & B AB"));
        assert_eq!(unescape_xml("a &bogus; b & c"), "a &bogus; b & c");
    }

    #[test]
    fn blank_verse_counts_but_has_no_text() {
        let corpus = VerseCorpus::from_xml(SAMPLE).unwrap();
        assert_eq!(corpus.chapter(112).unwrap().verse_count(), 3);
        assert_eq!(corpus.verse_text(112, 3), None);
        assert_eq!(corpus.verse_text(112, 4), None);
        assert_eq!(corpus.verse_text(2, 1), None);
    }

    #[test]
    fn empty_document_is_an_error() {
        assert!(VerseCorpus::from_xml("<quran></quran>").is_err());
    }
}

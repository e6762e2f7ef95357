//! End-to-end runs of the production pipeline against an on-disk corpus and
//! a file-backed ledger, with scripted stand-ins for the network and ffmpeg.

use async_trait::async_trait;
use ayah_shorts::adapter::DurationBounds;
use ayah_shorts::audio::{AudioError, AudioSegment, RecitationSource};
use ayah_shorts::corpus::VerseCorpus;
use ayah_shorts::error::ProductionError;
use ayah_shorts::ledger::{FileLedger, RangeLedger};
use ayah_shorts::pipeline::{PipelineSettings, ProductionPipeline};
use ayah_shorts::plan::{GeneratorError, PlanGenerator, PlanProposal};
use ayah_shorts::render::{RenderError, RenderJob, Renderer};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CORPUS: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<quran>
	<sura index="1" name="الفاتحة">
		<aya index="1" text="بِسْمِ اللَّهِ الرَّحْمَٰنِ الرَّحِيمِ" />
		<aya index="2" text="الْحَمْدُ لِلَّهِ رَبِّ الْعَالَمِينَ" />
		<aya index="3" text="الرَّحْمَٰنِ الرَّحِيمِ" />
		<aya index="4" text="مَالِكِ يَوْمِ الدِّينِ" />
		<aya index="5" text="إِيَّاكَ نَعْبُدُ وَإِيَّاكَ نَسْتَعِينُ" />
		<aya index="6" text="اهْدِنَا الصِّرَاطَ الْمُسْتَقِيمَ" />
		<aya index="7" text="صِرَاطَ الَّذِينَ أَنْعَمْتَ عَلَيْهِمْ" />
	</sura>
	<sura index="108" name="الكوثر">
		<aya index="1" text="إِنَّا أَعْطَيْنَاكَ الْكَوْثَرَ" />
		<aya index="2" text="فَصَلِّ لِرَبِّكَ وَانْحَرْ" />
		<aya index="3" text="إِنَّ شَانِئَكَ هُوَ الْأَبْتَرُ" />
	</sura>
</quran>
"#;

type Exclusions = Arc<Mutex<Vec<Vec<String>>>>;

struct Scripted {
    plans: Mutex<VecDeque<(i64, i64, i64)>>,
    seen_exclusions: Exclusions,
}

impl Scripted {
    fn new(plans: &[(i64, i64, i64)]) -> Self {
        Self {
            plans: Mutex::new(plans.iter().copied().collect()),
            seen_exclusions: Exclusions::default(),
        }
    }
}

#[async_trait]
impl PlanGenerator for Scripted {
    async fn request_plan(&self, excluded: &[String]) -> Result<PlanProposal, GeneratorError> {
        self.seen_exclusions.lock().unwrap().push(excluded.to_vec());
        let (surah, start_ayah, end_ayah) = self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GeneratorError::Unavailable("no more plans".into()))?;
        Ok(PlanProposal {
            theme: format!("theme {surah}"),
            surah,
            start_ayah,
            end_ayah,
            title: "عنوان".into(),
            hashtags: vec!["#quran".into()],
        })
    }
}

/// Every verse lasts `secs` except chapter 108, whose verses last 2s.
struct FixedAudio {
    secs: f64,
}

#[async_trait]
impl RecitationSource for FixedAudio {
    async fn fetch_segment(&self, chapter: u32, verse: u32) -> Result<AudioSegment, AudioError> {
        let duration_secs = if chapter == 108 { 2.0 } else { self.secs };
        Ok(AudioSegment {
            chapter,
            verse,
            path: PathBuf::from(format!("{chapter}_{verse}.mp3")),
            duration_secs,
        })
    }

    async fn concat(&self, segments: &[AudioSegment], out: &Path) -> Result<PathBuf, AudioError> {
        assert!(!segments.is_empty());
        Ok(out.to_path_buf())
    }
}

struct WritingRenderer;

#[async_trait]
impl Renderer for WritingRenderer {
    async fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        std::fs::create_dir_all(job.output.parent().unwrap()).map_err(|e| RenderError(e.to_string()))?;
        std::fs::write(&job.output, b"mp4").map_err(|e| RenderError(e.to_string()))
    }
}

fn settings(root: &Path, target: u32, attempts: u32) -> PipelineSettings {
    PipelineSettings {
        bounds: DurationBounds::new(7.0, 30.0).unwrap(),
        target_units: target,
        max_attempts: attempts,
        generator_retries: 5,
        cooldown: Duration::ZERO,
        output_dir: root.join("output"),
        temp_dir: root.join("temp"),
    }
}

async fn load_corpus(root: &Path) -> Arc<VerseCorpus> {
    let path = root.join("quran.xml");
    std::fs::write(&path, CORPUS).unwrap();
    Arc::new(VerseCorpus::load(&path).await.unwrap())
}

#[tokio::test]
async fn produces_and_persists_ranges() {
    let root = tempfile::tempdir().unwrap();
    let corpus = load_corpus(root.path()).await;
    let ledger_path = root.path().join("logs").join("used_verses.txt");
    let ledger = FileLedger::open(&ledger_path).await.unwrap();

    // 1:1-7 is 70s and gets trimmed to 1:1-3; 1:9-9 does not exist;
    // 108:1-3 is only 6s; 1:4-5 fits.
    let generator = Scripted::new(&[(1, 1, 7), (1, 9, 9), (108, 1, 3), (1, 4, 5)]);
    let seen = Arc::clone(&generator.seen_exclusions);
    let mut pipeline = ProductionPipeline::new(
        corpus,
        generator,
        FixedAudio { secs: 10.0 },
        WritingRenderer,
        ledger,
        vec![root.path().join("bg.mp4")],
        settings(root.path(), 2, 10),
    )
    .unwrap()
    .with_seed(3);

    let summary = pipeline.run().await.unwrap();
    let keys: Vec<_> = summary.produced.iter().map(|u| u.key.as_str()).collect();
    assert_eq!(keys, vec!["1:1-3", "1:4-5"]);
    assert_eq!(summary.attempts, 4);
    assert_eq!(summary.skipped.get("verse_out_of_range"), Some(&1));
    assert_eq!(summary.skipped.get("too_short"), Some(&1));

    let first = &summary.produced[0];
    assert_eq!(first.proposed.key(), "1:1-7");
    assert_eq!(first.verses.len(), 3);
    assert_eq!(first.total_secs, 30.0);
    assert!(first.output.ends_with("001_001-003.mp4"));
    assert!(first.output.exists());

    let sidecar: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(first.output.with_extension("json")).unwrap()).unwrap();
    assert_eq!(sidecar["key"], "1:1-3");
    assert_eq!(sidecar["plan"]["title"], "عنوان");

    let on_disk = std::fs::read_to_string(&ledger_path).unwrap();
    assert_eq!(on_disk, "1:1-3\n1:4-5\n");

    // Every request after the first commit carries it as an exclusion.
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    assert!(seen[0].is_empty());
    for excluded in &seen[1..] {
        assert_eq!(excluded, &vec!["1:1-3".to_string()]);
    }
    assert!(pipeline.ledger().contains("1:4-5"));
}

#[tokio::test]
async fn reopened_ledger_blocks_repeats_across_runs() {
    let root = tempfile::tempdir().unwrap();
    let ledger_path = root.path().join("used_verses.txt");

    {
        let corpus = load_corpus(root.path()).await;
        let ledger = FileLedger::open(&ledger_path).await.unwrap();
        let mut pipeline = ProductionPipeline::new(
            corpus,
            Scripted::new(&[(1, 2, 3)]),
            FixedAudio { secs: 10.0 },
            WritingRenderer,
            ledger,
            vec![root.path().join("bg.mp4")],
            settings(root.path(), 1, 1),
        )
        .unwrap();
        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.produced.len(), 1);
    }

    let corpus = load_corpus(root.path()).await;
    let ledger = FileLedger::open(&ledger_path).await.unwrap();
    assert!(ledger.contains("1:2-3"));

    let mut pipeline = ProductionPipeline::new(
        corpus,
        Scripted::new(&[(1, 2, 3); 5]),
        FixedAudio { secs: 10.0 },
        WritingRenderer,
        ledger,
        vec![root.path().join("bg.mp4")],
        settings(root.path(), 1, 3),
    )
    .unwrap();
    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, ProductionError::GeneratorExhausted { attempts: 5 }));
    assert_eq!(std::fs::read_to_string(&ledger_path).unwrap(), "1:2-3\n");
}

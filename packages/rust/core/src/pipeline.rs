//! End-to-end `extract` pipeline: source root → characters, stories, quotes,
//! optional mirror and image manifest → index → published snapshot.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use akdata_shared::{AkDataError, BuildIndex, ExtractOptions, INDEX_VERSION, IndexNotes, Result};
use akdata_sources::{LayoutRegistry, SourceTables, StoryIndex, load_story_index};

use crate::assembler::{write_index, write_json};
use crate::characters::build_characters;
use crate::context::BuildContext;
use crate::images::scan_images;
use crate::mirror::mirror_sources;
use crate::quotes::{QuoteLimits, attach_quotes};
use crate::stories::build_stories;

/// Note recorded when no layout matches the source root.
pub const EXCEL_DIR_NOT_FOUND: &str = "excel dir not found";

/// File name of the image manifest inside a snapshot.
pub const IMAGE_MANIFEST: &str = "image_manifest.json";

/// Configuration for one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Root of the raw data dump.
    pub source: PathBuf,
    /// Output root; receives `latest/` and `release/<date>/`.
    pub out: PathBuf,
    /// Image directory to scan into the snapshot, if any.
    pub images: Option<PathBuf>,
    pub options: ExtractOptions,
}

/// Result of the extraction pipeline.
#[derive(Debug)]
pub struct ExtractResult {
    pub latest: PathBuf,
    pub release: PathBuf,
    /// The index that was written into both snapshot directories.
    pub index: BuildIndex,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &ExtractResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &ExtractResult) {}
}

/// Run the full extraction pipeline.
///
/// 1. Resolve the source layout and load tables
/// 2. Write character files
/// 3. Write story files (placeholders, then full stories)
/// 4. Back-fill story quotes into character files
/// 5. Optionally mirror raw files and scan images
/// 6. Write the index and publish the snapshot
///
/// Only an absent source root or a failure writing outputs is an error.
/// Everything else is recorded in the index notes.
#[instrument(skip_all, fields(source = %config.source.display(), out = %config.out.display()))]
pub fn run_extract(config: &ExtractConfig, progress: &dyn ProgressReporter) -> Result<ExtractResult> {
    let start = Instant::now();
    let opts = &config.options;

    if !config.source.is_dir() {
        return Err(AkDataError::missing_source(&config.source));
    }

    let ctx = BuildContext::create(&config.out)?;
    info!(staging = %ctx.staging().display(), "starting extraction");
    let mut notes = IndexNotes::default();

    // --- Phase 1: Source ---
    progress.phase("Resolving source layout");
    let resolved = LayoutRegistry::new().resolve(&config.source, &opts.layout)?;
    let (tables, story_index) = match &resolved {
        Some(source) => {
            info!(layout = %source.layout, excel = %source.excel_dir.display(), "source resolved");
            notes.layout = Some(source.layout.clone());
            (
                SourceTables::load(&source.excel_dir),
                load_story_index(&source.excel_dir),
            )
        }
        None => {
            warn!(layout = %opts.layout, "no source layout matched, producing empty results");
            notes.missing_tables.push(EXCEL_DIR_NOT_FOUND.to_string());
            let index = StoryIndex {
                warnings: vec![EXCEL_DIR_NOT_FOUND.to_string()],
                ..Default::default()
            };
            (SourceTables::default(), index)
        }
    };
    notes.missing_tables.extend(tables.missing.iter().cloned());
    notes.table_warnings.extend(tables.warnings.iter().cloned());
    notes.story_warnings.extend(story_index.warnings.iter().cloned());

    // --- Phase 2: Characters ---
    progress.phase("Writing characters");
    let characters = build_characters(&tables, &ctx.subdir("characters")?, opts.collision_policy)?;

    // --- Phase 3: Stories ---
    progress.phase("Parsing stories");
    let story_dir = resolved.as_ref().and_then(|s| s.story_dir.as_deref());
    let stories = build_stories(
        &story_index.entries,
        story_dir,
        &ctx.subdir("stories")?,
        opts.max_speeches_per_story,
        opts.collision_policy,
    )?;

    // --- Phase 4: Quotes ---
    progress.phase("Collecting story quotes");
    notes.story_quotes_attached = attach_quotes(
        stories.stories.values(),
        &characters.paths,
        ctx.staging(),
        QuoteLimits::from(opts),
    )?;

    // --- Phase 5: Mirror / images ---
    let mirror = match (&resolved, opts.mirror) {
        (Some(source), true) => {
            progress.phase("Mirroring raw files");
            Some(mirror_sources(
                source,
                ctx.staging(),
                ctx.out_root(),
                opts.wrap_story_txt,
            )?)
        }
        _ => None,
    };

    let mut images = None;
    if let Some(image_dir) = &config.images {
        progress.phase("Scanning images");
        if let Some(manifest) = scan_images(image_dir, &opts.image_extensions)? {
            write_json(&ctx.staging().join(IMAGE_MANIFEST), &manifest)?;
            images = Some(IMAGE_MANIFEST.to_string());
        }
    }

    // --- Phase 6: Index + publish ---
    progress.phase("Publishing snapshot");
    notes.character_warnings = characters.warnings;
    notes.story_warnings.extend(stories.warnings);
    notes.slug_collisions = characters.collisions;
    notes.slug_collisions.extend(stories.collisions);
    notes.character_count = characters.paths.len();
    notes.story_count = stories.paths.len();

    let index = BuildIndex {
        version: INDEX_VERSION.to_string(),
        generated_at: ctx.generated_at(),
        characters: characters.paths,
        stories: stories.paths,
        mirror,
        images,
        notes,
    };
    write_index(ctx.staging(), &index)?;
    let published = ctx.publish()?;

    let result = ExtractResult {
        latest: published.latest,
        release: published.release,
        index,
        elapsed: start.elapsed(),
    };
    info!(
        characters = result.index.notes.character_count,
        stories = result.index.notes.story_count,
        quotes_attached = result.index.notes.story_quotes_attached,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "extraction complete"
    );
    progress.done(&result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use akdata_shared::{AppConfig, Character, Story};

    use crate::assembler::read_json_as;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("akdata-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config(source: &Path, out: &Path) -> ExtractConfig {
        ExtractConfig {
            source: source.to_path_buf(),
            out: out.to_path_buf(),
            images: None,
            options: ExtractOptions::from(&AppConfig::default()),
        }
    }

    fn copy_fixture(name: &str, dest: &Path) {
        let src = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/json")
            .join(name);
        std::fs::copy(&src, dest).unwrap();
    }

    #[test]
    fn single_character_without_handbook_or_charword() {
        let tmp = temp_dir();
        let excel = tmp.join("src/gamedata/excel");
        std::fs::create_dir_all(&excel).unwrap();
        std::fs::write(
            excel.join("character_table.json"),
            r#"[{"id": "001", "name": "Amiya"}]"#,
        )
        .unwrap();

        let result = run_extract(&config(&tmp.join("src"), &tmp.join("out")), &SilentProgress).unwrap();

        let ch: Character = read_json_as(&result.latest.join("characters/amiya.json")).unwrap();
        assert_eq!(ch.id, "001");
        assert!(ch.profile.is_empty());
        assert!(ch.voice_lines.is_empty());

        let raw: serde_json::Value =
            read_json_as(&result.latest.join("characters/amiya.json")).unwrap();
        assert_eq!(raw["profile"], serde_json::json!({}));
        assert_eq!(raw["voiceLines"], serde_json::json!({}));

        let notes = &result.index.notes;
        assert_eq!(notes.missing_tables, vec!["handbook_info_table.json", "charword_table.json"]);
        assert_eq!(notes.story_warnings, vec!["story index not found"]);
        assert_eq!(notes.layout.as_deref(), Some("gamedata"));
        assert!(result.release.join("index.json").is_file());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_source_root_is_fatal() {
        let tmp = temp_dir();
        let err = run_extract(&config(&tmp.join("absent"), &tmp.join("out")), &SilentProgress)
            .unwrap_err();
        assert!(matches!(err, AkDataError::MissingSource { .. }));
        assert!(!tmp.join("out").exists());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unrecognized_root_produces_empty_snapshot() {
        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("src/unrelated")).unwrap();

        let result = run_extract(&config(&tmp.join("src"), &tmp.join("out")), &SilentProgress).unwrap();
        assert!(result.index.characters.is_empty());
        assert_eq!(result.index.notes.missing_tables, vec![EXCEL_DIR_NOT_FOUND]);
        assert_eq!(result.index.notes.story_warnings, vec![EXCEL_DIR_NOT_FOUND]);
        assert_eq!(result.index.notes.layout, None);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn flat_source_with_nested_output_mirrors_only_its_tables() {
        let tmp = temp_dir();
        let src = tmp.join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(
            src.join("character_table.json"),
            r#"{"char_002_amiya": {"name": "Amiya"}}"#,
        )
        .unwrap();

        let mut cfg = config(&src, &src.join("docs"));
        cfg.options.mirror = true;

        for _ in 0..2 {
            let result = run_extract(&cfg, &SilentProgress).unwrap();
            assert_eq!(result.index.notes.layout.as_deref(), Some("flat"));
            let mirror = result.index.mirror.as_ref().unwrap();
            assert_eq!(mirror.lists.excel, vec!["character_table.json"]);
            assert!(!result.latest.join("excel/docs").exists());
            assert!(result.latest.join("characters/amiya.json").is_file());
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn full_fixture_run() {
        let tmp = temp_dir();
        let src = tmp.join("src");
        let excel = src.join("gamedata/excel");
        let story = src.join("gamedata/story/obt/main");
        std::fs::create_dir_all(&excel).unwrap();
        std::fs::create_dir_all(&story).unwrap();
        copy_fixture("character_table.json", &excel.join("character_table.json"));
        copy_fixture("handbook_info_table.json", &excel.join("handbook_info_table.json"));
        copy_fixture("charword_table.json", &excel.join("charword_table.json"));
        copy_fixture("story_review_table.json", &excel.join("story_review_table.json"));
        copy_fixture("level_main_00-01_beg.json", &story.join("level_main_00-01_beg.json"));
        std::fs::write(
            story.join("level_main_00-01_end.txt"),
            "[name=\"Kal'tsit\"]Get up.\n[name=\"Amiya\"]Doctor, we have to move.\n",
        )
        .unwrap();

        let images = tmp.join("images");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("amiya_whitecoat.png"), b"").unwrap();

        let mut cfg = config(&src, &tmp.join("out"));
        cfg.images = Some(images);
        cfg.options.mirror = true;
        cfg.options.wrap_story_txt = true;

        let result = run_extract(&cfg, &SilentProgress).unwrap();
        let index = &result.index;

        assert!(index.notes.missing_tables.is_empty());
        assert_eq!(index.notes.character_count, 2);
        assert!(index.characters.contains_key("amiya"));
        assert!(index.characters.contains_key("kaltsit"));
        assert!(index.stories.contains_key("level_main_00-01_beg"));
        assert!(index.stories.contains_key("level_main_00-01_end"));
        assert_eq!(index.notes.story_quotes_attached, 2);
        assert_eq!(index.images.as_deref(), Some(IMAGE_MANIFEST));

        let amiya: Character = read_json_as(&result.latest.join("characters/amiya.json")).unwrap();
        assert_eq!(amiya.profile.appellation.as_deref(), Some("Amiya"));
        assert_eq!(amiya.voice_lines["任命助理"], "ドクター、お疲れ様です。");
        assert_eq!(
            amiya.story_quotes,
            vec!["Doctor, can you hear me?", "Doctor, we have to move."]
        );

        let beg: Story =
            read_json_as(&result.latest.join("stories/level_main_00-01_beg.json")).unwrap();
        assert_eq!(beg.title, "Awakening");
        assert_eq!(beg.characters_involved, vec!["Amiya", "Kal'tsit"]);

        let mirror = index.mirror.as_ref().unwrap();
        assert_eq!(mirror.excel_count, 4);
        assert_eq!(mirror.story_txt_count, 1);
        assert!(result
            .latest
            .join("story_json/obt/main/level_main_00-01_end.json")
            .is_file());
        assert!(result.release.join("image_manifest.json").is_file());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}

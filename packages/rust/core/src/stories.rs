//! Per-story JSON files.
//!
//! Stories come from two places. The story index table yields placeholder
//! entries (title only), and the story directory yields full stories from
//! `.json` payloads or `.txt` scripts. A full story replaces the placeholder
//! with the same id.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use akdata_harvest::{build_chapters, parse_script, payload_title, single_scene_chapter};
use akdata_shared::{CollisionPolicy, Result, Story, normalize_speaker, slugify};
use akdata_sources::{StoryIndexEntry, read_json};

use crate::assembler::write_json;
use crate::context::walk_error;
use crate::slugs::SlugRegistry;

/// Note attached to placeholder stories built from the index alone.
pub const PLACEHOLDER_NOTE: &str =
    "Minimal index entry. Full story (with speeches) depends on available sources.";

/// Outcome of the story stage.
#[derive(Debug, Default)]
pub struct StoryBuild {
    /// Every story written, keyed (and therefore ordered) by id.
    pub stories: BTreeMap<String, Story>,
    /// Story id to path relative to the snapshot root.
    pub paths: BTreeMap<String, String>,
    pub warnings: Vec<String>,
    pub collisions: Vec<String>,
}

/// Write placeholders for `index`, then full stories from `story_dir`.
#[instrument(skip_all, fields(index = index.len(), story_dir = ?story_dir))]
pub fn build_stories(
    index: &[StoryIndexEntry],
    story_dir: Option<&Path>,
    stories_dir: &Path,
    max_speeches: usize,
    policy: CollisionPolicy,
) -> Result<StoryBuild> {
    let mut build = StoryBuild::default();
    let mut titles: BTreeMap<String, String> = BTreeMap::new();

    let mut placeholder_slugs = SlugRegistry::new("story", policy);
    for entry in index {
        let base = slugify(&entry.id);
        if base.is_empty() {
            build
                .warnings
                .push(format!("story index key '{}' has an empty slug", entry.id));
            continue;
        }
        let Some(id) = placeholder_slugs.claim(&base, &entry.id) else {
            continue;
        };
        titles.insert(id.clone(), entry.title.clone());
        let story = Story {
            id: id.clone(),
            title: entry.title.clone(),
            note: Some(PLACEHOLDER_NOTE.to_string()),
            ..Default::default()
        };
        build.write(stories_dir, story)?;
    }
    let placeholders = build.stories.len();

    let mut file_slugs = SlugRegistry::new("story", policy);
    if let Some(story_dir) = story_dir {
        for path in story_files(story_dir)? {
            let rel = path
                .strip_prefix(story_dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            let base = slugify(&stem);
            if base.is_empty() {
                warn!(file = %rel, "story file has an empty slug, skipping");
                build.warnings.push(format!("story file {rel} has an empty slug"));
                continue;
            }
            let Some(id) = file_slugs.claim(&base, &rel) else {
                continue;
            };

            match story_from_file(&path, &id, titles.get(&id), max_speeches) {
                Ok(story) => build.write(stories_dir, story)?,
                Err(message) => {
                    warn!(file = %rel, error = %message, "story file skipped");
                    build.warnings.push(format!("Failed to parse story {rel}: {message}"));
                }
            }
        }
    }

    build.collisions = placeholder_slugs.into_collisions();
    build.collisions.extend(file_slugs.into_collisions());
    info!(
        stories = build.stories.len(),
        placeholders,
        warnings = build.warnings.len(),
        "stories written"
    );
    Ok(build)
}

impl StoryBuild {
    fn write(&mut self, stories_dir: &Path, story: Story) -> Result<()> {
        write_json(&stories_dir.join(format!("{}.json", story.id)), &story)?;
        self.paths
            .insert(story.id.clone(), format!("stories/{}.json", story.id));
        self.stories.insert(story.id.clone(), story);
        Ok(())
    }
}

/// `.json` and `.txt` files under `story_dir`, sorted by path.
fn story_files(story_dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(story_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(story_dir, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_story = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json") || e.eq_ignore_ascii_case("txt"));
        if is_story {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Build one full story. Errors are returned as display strings for the
/// story warnings list.
fn story_from_file(
    path: &Path,
    id: &str,
    index_title: Option<&String>,
    max_speeches: usize,
) -> std::result::Result<Story, String> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let (title, chapters) = if is_json {
        let payload = read_json(path).map_err(|e| e.to_string())?;
        let title = payload_title(&payload)
            .or_else(|| index_title.cloned())
            .unwrap_or_else(|| id.to_string());
        let chapters = build_chapters(&payload, &title, max_speeches);
        (title, chapters)
    } else {
        let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
        let script = String::from_utf8_lossy(&bytes);
        let title = index_title.cloned().unwrap_or_else(|| id.to_string());
        let chapters = vec![single_scene_chapter(&title, parse_script(&script, max_speeches))];
        (title, chapters)
    };

    let mut story = Story {
        id: id.to_string(),
        title,
        chapters,
        ..Default::default()
    };
    story.characters_involved = characters_involved(&story);
    debug!(id, speeches = story.speech_count(), "story parsed");
    Ok(story)
}

/// Distinct normalized speaker names in order of first appearance.
fn characters_involved(story: &Story) -> Vec<String> {
    let mut seen = Vec::new();
    for speech in story.speeches() {
        let name = normalize_speaker(&speech.speaker);
        if !name.is_empty() && !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

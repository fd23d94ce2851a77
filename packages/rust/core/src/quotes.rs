//! Back-fill short story lines into character files as `storyQuotes`.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, instrument};

use akdata_shared::{Character, ExtractOptions, Result, Story, normalize_speaker, slugify};

use crate::assembler::{read_json_as, write_json};

/// Limits for quote collection.
#[derive(Debug, Clone, Copy)]
pub struct QuoteLimits {
    /// New quotes accepted per character in one run.
    pub max_per_character: usize,
    /// Longest accepted quote, in characters.
    pub max_chars: usize,
}

impl From<&ExtractOptions> for QuoteLimits {
    fn from(opts: &ExtractOptions) -> Self {
        Self {
            max_per_character: opts.max_quotes_per_character,
            max_chars: opts.max_quote_chars,
        }
    }
}

/// Collect quotes from `stories` for the characters in `characters` and
/// append them to the files under `snapshot_root`.
///
/// `characters` maps slug to a path relative to `snapshot_root`. Stories are
/// visited in iteration order. Returns the number of files modified.
#[instrument(skip_all, fields(characters = characters.len()))]
pub fn attach_quotes<'a>(
    stories: impl IntoIterator<Item = &'a Story>,
    characters: &BTreeMap<String, String>,
    snapshot_root: &Path,
    limits: QuoteLimits,
) -> Result<usize> {
    let collected = collect_quotes(stories, characters, limits);

    let mut touched = 0;
    for (slug, quotes) in collected {
        if quotes.is_empty() {
            continue;
        }
        let Some(rel) = characters.get(&slug) else {
            continue;
        };
        let path = snapshot_root.join(rel);
        if !path.is_file() {
            continue;
        }

        let mut character: Character = read_json_as(&path)?;
        debug!(slug = %slug, added = quotes.len(), "attaching quotes");
        character.story_quotes.extend(quotes);
        write_json(&path, &character)?;
        touched += 1;
    }

    info!(touched, "story quotes attached");
    Ok(touched)
}

/// Per-slug quote lists, first-seen order, capped.
fn collect_quotes<'a>(
    stories: impl IntoIterator<Item = &'a Story>,
    characters: &BTreeMap<String, String>,
    limits: QuoteLimits,
) -> BTreeMap<String, Vec<String>> {
    let mut collected: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for story in stories {
        for speech in story.speeches() {
            let speaker = normalize_speaker(&speech.speaker);
            let text = speech.text.trim();
            if speaker.is_empty() || text.is_empty() {
                continue;
            }
            if text.chars().count() > limits.max_chars {
                continue;
            }
            let slug = slugify(&speaker);
            if !characters.contains_key(&slug) {
                continue;
            }
            let quotes = collected.entry(slug).or_default();
            if quotes.len() < limits.max_per_character {
                quotes.push(text.to_string());
            }
        }
    }

    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use akdata_harvest::single_scene_chapter;
    use akdata_shared::Speech;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("akdata-quotes-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(dir.join("characters")).unwrap();
        dir
    }

    fn story(id: &str, speeches: Vec<Speech>) -> Story {
        Story {
            id: id.into(),
            title: id.into(),
            chapters: vec![single_scene_chapter(id, speeches)],
            ..Default::default()
        }
    }

    fn default_limits() -> QuoteLimits {
        QuoteLimits::from(&ExtractOptions::from(&akdata_shared::AppConfig::default()))
    }

    fn amiya_map() -> BTreeMap<String, String> {
        BTreeMap::from([("amiya".to_string(), "characters/amiya.json".to_string())])
    }

    fn write_amiya(root: &Path, quotes: Vec<String>) {
        let ch = Character {
            id: "char_002_amiya".into(),
            name: "Amiya".into(),
            story_quotes: quotes,
            ..Default::default()
        };
        write_json(&root.join("characters/amiya.json"), &ch).unwrap();
    }

    #[test]
    fn length_limit_is_inclusive() {
        let ok = "a".repeat(120);
        let too_long = "b".repeat(121);
        let stories = [story("s", vec![Speech::new("Amiya", &too_long), Speech::new("Amiya", &ok)])];

        let collected = collect_quotes(&stories, &amiya_map(), default_limits());
        assert_eq!(collected["amiya"], vec![ok]);
    }

    #[test]
    fn cap_keeps_first_seen() {
        let speeches = (0..350)
            .map(|i| Speech::new("Amiya", format!("line {i}")))
            .collect();
        let stories = [story("s", speeches)];

        let collected = collect_quotes(&stories, &amiya_map(), default_limits());
        assert_eq!(collected["amiya"].len(), 300);
        assert_eq!(collected["amiya"][0], "line 0");
        assert_eq!(collected["amiya"][299], "line 299");
    }

    #[test]
    fn annotated_speakers_match_and_unknowns_drop() {
        let stories = [story(
            "s",
            vec![
                Speech::new("Amiya (young)", "  Doctor?  "),
                Speech::new("Mysterious Voice", "..."),
            ],
        )];
        let collected = collect_quotes(&stories, &amiya_map(), default_limits());
        assert_eq!(collected.len(), 1);
        assert_eq!(collected["amiya"], vec!["Doctor?"]);
    }

    #[test]
    fn quotes_append_to_existing_file() {
        let root = temp_dir();
        write_amiya(&root, vec!["earlier".into()]);

        let stories = [
            story("a", vec![Speech::new("Amiya", "first")]),
            story("b", vec![Speech::new("Amiya", "second")]),
        ];
        let touched =
            attach_quotes(&stories, &amiya_map(), &root, default_limits()).unwrap();
        assert_eq!(touched, 1);

        let ch: Character = read_json_as(&root.join("characters/amiya.json")).unwrap();
        assert_eq!(ch.story_quotes, vec!["earlier", "first", "second"]);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_character_file_is_skipped() {
        let root = temp_dir();
        let stories = [story("a", vec![Speech::new("Amiya", "hello")])];
        let touched =
            attach_quotes(&stories, &amiya_map(), &root, default_limits()).unwrap();
        assert_eq!(touched, 0);
        let _ = std::fs::remove_dir_all(&root);
    }
}

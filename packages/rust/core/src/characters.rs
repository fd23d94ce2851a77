//! Per-character JSON files.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use akdata_shared::{Character, CollisionPolicy, Profile, Result, slugify};
use akdata_sources::{CharacterEntry, SourceTables, first_truthy};

use crate::assembler::write_json;
use crate::slugs::SlugRegistry;

/// Outcome of the character stage.
#[derive(Debug, Default)]
pub struct CharacterBuild {
    /// Slug to path relative to the snapshot root.
    pub paths: BTreeMap<String, String>,
    pub warnings: Vec<String>,
    pub collisions: Vec<String>,
}

/// Write `characters/<slug>.json` for every named entry of the character table.
#[instrument(skip_all, fields(policy = %policy))]
pub fn build_characters(
    tables: &SourceTables,
    characters_dir: &Path,
    policy: CollisionPolicy,
) -> Result<CharacterBuild> {
    let mut build = CharacterBuild::default();
    let mut slugs = SlugRegistry::new("character", policy);

    for entry in tables.character_entries() {
        let Some(name) = entry
            .fields
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
        else {
            continue;
        };

        let base = slugify(name);
        if base.is_empty() {
            warn!(id = entry.id, name, "character name has an empty slug, skipping");
            build
                .warnings
                .push(format!("character {} ({name}) has an empty slug", entry.id));
            continue;
        }
        let Some(slug) = slugs.claim(&base, entry.id) else {
            continue;
        };

        let character = character_record(tables, &entry, name);
        write_json(&characters_dir.join(format!("{slug}.json")), &character)?;
        build.paths.insert(slug.clone(), format!("characters/{slug}.json"));
    }

    build.collisions = slugs.into_collisions();
    info!(characters = build.paths.len(), "characters written");
    Ok(build)
}

fn character_record(tables: &SourceTables, entry: &CharacterEntry<'_>, name: &str) -> Character {
    let field = |key: &str| entry.fields.get(key).cloned().unwrap_or(Value::Null);

    Character {
        id: entry.id.to_string(),
        name: name.to_string(),
        rarity: field("rarity"),
        profession: field("profession"),
        sub_profession_id: field("subProfessionId"),
        profile: tables
            .handbook_entry(entry.id, name)
            .map(|hb| profile_from_handbook(hb, name))
            .unwrap_or_default(),
        voice_lines: tables.voice_lines(entry.id, name),
        speech_style: Map::new(),
        story_quotes: Vec::new(),
    }
}

fn profile_from_handbook(hb: &Map<String, Value>, name: &str) -> Profile {
    let appellation = hb
        .get("appellation")
        .and_then(Value::as_str)
        .filter(|a| !a.is_empty())
        .unwrap_or(name);
    let biography = first_truthy(hb, &["storyTextAudio", "storyText"])
        .cloned()
        .unwrap_or_else(|| json!({}));

    Profile {
        appellation: Some(appellation.to_string()),
        biography: Some(biography),
        gender: hb.get("gender").cloned(),
        faction: hb.get("faction").cloned(),
        race: hb.get("race").cloned(),
        place: hb.get("place").cloned(),
        birth: hb.get("birth").cloned(),
    }
}

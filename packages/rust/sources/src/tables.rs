//! Excel table loading and schema-tolerant lookups.
//!
//! Tables are kept as `serde_json::Value`: their shapes differ between
//! client versions, so every accessor tries known shapes and falls back instead of
//! deserializing into fixed structs.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use akdata_shared::{AkDataError, Result};

pub const CHARACTER_TABLE: &str = "character_table.json";
pub const HANDBOOK_TABLE: &str = "handbook_info_table.json";
pub const CHARWORD_TABLE: &str = "charword_table.json";

/// Story index tables, in lookup order. The first one present is used.
pub const STORY_INDEX_CANDIDATES: &[&str] = &[
    "story_review_table.json",
    "story_review_meta_table.json",
    "storyinfo.json",
];

/// Read and parse one JSON file. A leading UTF-8 BOM is tolerated.
pub fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| AkDataError::io(path, e))?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(content.as_str());
    serde_json::from_str(content)
        .map_err(|e| AkDataError::parse(format!("{}: {e}", path.display())))
}

/// JavaScript-style truthiness, used where the dump signals "absent" with
/// empty strings, lists or objects instead of omitting the key.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// First truthy value stored under one of `keys`.
pub fn first_truthy<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| truthy(value))
}

/// Scalar identifiers (`"char_002_amiya"`, `1001`) as strings.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-empty object found under `id`, then under `name`.
fn lookup_entry<'a>(
    table: &'a Map<String, Value>,
    id: &str,
    name: &str,
) -> Option<&'a Map<String, Value>> {
    [id, name]
        .iter()
        .filter_map(|key| table.get(*key))
        .find(|value| truthy(value))
        .and_then(Value::as_object)
}

// ---------------------------------------------------------------------------
// SourceTables
// ---------------------------------------------------------------------------

/// A character table row with its resolved identifier.
#[derive(Debug, Clone, Copy)]
pub struct CharacterEntry<'a> {
    pub id: &'a str,
    pub fields: &'a Map<String, Value>,
}

/// The three character-related tables of one excel directory.
#[derive(Debug, Default)]
pub struct SourceTables {
    characters: Value,
    handbook: Value,
    charword: Value,
    /// Names of tables that were not present.
    pub missing: Vec<String>,
    /// Tables that were present but unreadable.
    pub warnings: Vec<String>,
}

impl SourceTables {
    /// Load whatever tables exist in `excel_dir`.
    pub fn load(excel_dir: &Path) -> Self {
        let mut tables = Self::default();
        tables.characters = tables.load_one(excel_dir, CHARACTER_TABLE);
        tables.handbook = tables.load_one(excel_dir, HANDBOOK_TABLE);
        tables.charword = tables.load_one(excel_dir, CHARWORD_TABLE);
        tables
    }

    fn load_one(&mut self, excel_dir: &Path, name: &str) -> Value {
        let path = excel_dir.join(name);
        if !path.is_file() {
            debug!(table = name, "table not present");
            self.missing.push(name.to_string());
            return Value::Null;
        }
        match read_json(&path) {
            Ok(value) => value,
            Err(e) => {
                warn!(table = name, error = %e, "table unreadable, treating as empty");
                self.warnings.push(format!("Failed to parse {name}: {e}"));
                Value::Null
            }
        }
    }

    /// Build from already-parsed values (no missing/warning bookkeeping).
    pub fn from_values(characters: Value, handbook: Value, charword: Value) -> Self {
        Self {
            characters,
            handbook,
            charword,
            ..Default::default()
        }
    }

    /// Character rows in table order.
    ///
    /// Accepts a mapping keyed by id, or a list of rows carrying `id`/`charId`.
    pub fn character_entries(&self) -> Vec<CharacterEntry<'_>> {
        match &self.characters {
            Value::Object(map) => map
                .iter()
                .filter_map(|(id, row)| {
                    row.as_object().map(|fields| CharacterEntry {
                        id: id.as_str(),
                        fields,
                    })
                })
                .collect(),
            Value::Array(rows) => rows
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|fields| {
                    let id = ["id", "charId"]
                        .iter()
                        .find_map(|k| fields.get(*k).and_then(Value::as_str))
                        .filter(|id| !id.is_empty())?;
                    Some(CharacterEntry { id, fields })
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Handbook entry for a character, by id then by display name.
    ///
    /// Newer tables nest the entries under `handbookDict`.
    pub fn handbook_entry(&self, id: &str, name: &str) -> Option<&Map<String, Value>> {
        let root = self.handbook.as_object()?;
        let dict = match root.get("handbookDict") {
            Some(Value::Object(inner)) => inner,
            _ => root,
        };
        lookup_entry(dict, id, name)
    }

    /// Voice lines for a character.
    ///
    /// A direct entry under the id or name is used as-is. Otherwise, when the
    /// table carries a `charWords` mapping, its rows for this character are
    /// gathered as `voiceTitle -> voiceText`.
    pub fn voice_lines(&self, id: &str, name: &str) -> Map<String, Value> {
        let Some(table) = self.charword.as_object() else {
            return Map::new();
        };
        if let Some(entry) = lookup_entry(table, id, name) {
            return entry.clone();
        }

        let Some(Value::Object(words)) = table.get("charWords") else {
            return Map::new();
        };
        let mut lines = Map::new();
        for (word_key, word) in words {
            let Some(word) = word.as_object() else {
                continue;
            };
            if word.get("charId").and_then(Value::as_str) != Some(id) {
                continue;
            }
            let Some(Value::String(text)) = word.get("voiceText") else {
                continue;
            };
            let title = ["voiceTitle", "voiceId"]
                .iter()
                .find_map(|k| word.get(*k).and_then(Value::as_str))
                .filter(|t| !t.is_empty())
                .unwrap_or(word_key.as_str());
            lines.insert(title.to_string(), Value::String(text.clone()));
        }
        lines
    }
}

// ---------------------------------------------------------------------------
// Story index
// ---------------------------------------------------------------------------

/// One row of a story index table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryIndexEntry {
    /// Lower-cased story key.
    pub id: String,
    pub title: String,
}

/// Outcome of looking for a story index in an excel directory.
#[derive(Debug, Default)]
pub struct StoryIndex {
    pub entries: Vec<StoryIndexEntry>,
    pub warnings: Vec<String>,
}

/// Find and parse the first available story index table.
pub fn load_story_index(excel_dir: &Path) -> StoryIndex {
    let Some((name, path)) = STORY_INDEX_CANDIDATES
        .iter()
        .map(|name| (*name, excel_dir.join(name)))
        .find(|(_, path)| path.is_file())
    else {
        return StoryIndex {
            entries: Vec::new(),
            warnings: vec!["story index not found".to_string()],
        };
    };

    let data = match read_json(&path) {
        Ok(data) => data,
        Err(e) => {
            return StoryIndex {
                entries: Vec::new(),
                warnings: vec![format!("Failed to parse story index: {e}")],
            };
        }
    };

    match parse_story_index(&data) {
        Some(entries) => {
            debug!(table = name, entries = entries.len(), "story index loaded");
            StoryIndex {
                entries,
                warnings: Vec::new(),
            }
        }
        None => StoryIndex {
            entries: Vec::new(),
            warnings: vec![format!("Unrecognized story index structure in {name}")],
        },
    }
}

/// Parse the `{"infos": {...}}` or `{"entry": [...]}` index shapes.
///
/// Returns `None` for any other shape.
pub fn parse_story_index(data: &Value) -> Option<Vec<StoryIndexEntry>> {
    let root = data.as_object()?;

    if let Some(Value::Object(infos)) = root.get("infos") {
        let entries = infos
            .iter()
            .map(|(sid, meta)| StoryIndexEntry {
                id: sid.to_lowercase(),
                title: entry_title(meta).unwrap_or_else(|| sid.clone()),
            })
            .collect();
        return Some(entries);
    }

    if let Some(Value::Array(rows)) = root.get("entry") {
        let entries = rows
            .iter()
            .filter_map(|row| {
                let fields = row.as_object()?;
                let sid = ["id", "key", "code"]
                    .iter()
                    .filter_map(|k| fields.get(*k))
                    .find(|v| truthy(v))
                    .and_then(id_string)?
                    .to_lowercase();
                Some(StoryIndexEntry {
                    title: entry_title(row).unwrap_or_else(|| sid.clone()),
                    id: sid,
                })
            })
            .collect();
        return Some(entries);
    }

    None
}

fn entry_title(meta: &Value) -> Option<String> {
    let fields = meta.as_object()?;
    ["name", "title"]
        .iter()
        .find_map(|k| fields.get(*k).and_then(Value::as_str))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("akdata-tables-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn load_reports_missing_tables() {
        let dir = temp_dir();
        std::fs::write(dir.join(CHARACTER_TABLE), r#"{"char_002_amiya": {"name": "Amiya"}}"#)
            .unwrap();

        let tables = SourceTables::load(&dir);
        assert_eq!(tables.missing, vec![HANDBOOK_TABLE, CHARWORD_TABLE]);
        assert!(tables.warnings.is_empty());
        assert_eq!(tables.character_entries().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_table_becomes_warning() {
        let dir = temp_dir();
        std::fs::write(dir.join(CHARACTER_TABLE), "{not json").unwrap();

        let tables = SourceTables::load(&dir);
        assert_eq!(tables.warnings.len(), 1);
        assert!(tables.warnings[0].starts_with("Failed to parse character_table.json"));
        assert!(tables.character_entries().is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bom_is_tolerated() {
        let dir = temp_dir();
        let path = dir.join("bom.json");
        std::fs::write(&path, "\u{feff}{\"a\": 1}").unwrap();
        assert_eq!(read_json(&path).unwrap(), json!({"a": 1}));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn character_entries_from_list_rows() {
        let tables = SourceTables::from_values(
            json!([{"id": "001", "name": "Amiya"}, {"name": "no id"}, {"charId": "002", "name": "Kal'tsit"}]),
            Value::Null,
            Value::Null,
        );
        let ids: Vec<_> = tables.character_entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, ["001", "002"]);
    }

    #[test]
    fn handbook_dict_is_unwrapped_and_name_fallback() {
        let tables = SourceTables::from_values(
            Value::Null,
            json!({"handbookDict": {
                "char_002_amiya": {"gender": "female"},
                "Kal'tsit": {"race": "Feline"},
                "char_empty": {}
            }}),
            Value::Null,
        );
        assert_eq!(
            tables.handbook_entry("char_002_amiya", "Amiya").unwrap()["gender"],
            "female"
        );
        assert_eq!(tables.handbook_entry("char_003_kalts", "Kal'tsit").unwrap()["race"], "Feline");
        assert!(tables.handbook_entry("char_empty", "Nobody").is_none());
    }

    #[test]
    fn voice_lines_direct_entry() {
        let tables = SourceTables::from_values(
            Value::Null,
            Value::Null,
            json!({"char_002_amiya": {"greeting": "Doctor!"}}),
        );
        let lines = tables.voice_lines("char_002_amiya", "Amiya");
        assert_eq!(lines["greeting"], "Doctor!");
        assert!(tables.voice_lines("char_999", "Nobody").is_empty());
    }

    #[test]
    fn voice_lines_from_char_words() {
        let tables = SourceTables::from_values(
            Value::Null,
            Value::Null,
            json!({"charWords": {
                "char_002_amiya_CN_001": {"charId": "char_002_amiya", "voiceTitle": "任命助理", "voiceText": "ドクター？"},
                "char_002_amiya_CN_002": {"charId": "char_002_amiya", "voiceText": "おはよう"},
                "char_003_kalts_CN_001": {"charId": "char_003_kalts", "voiceTitle": "任命助理", "voiceText": "..."}
            }}),
        );
        let lines = tables.voice_lines("char_002_amiya", "Amiya");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines["任命助理"], "ドクター？");
        assert_eq!(lines["char_002_amiya_CN_002"], "おはよう");
    }

    #[test]
    fn story_index_infos_shape() {
        let entries = parse_story_index(&json!({"infos": {
            "Main_00": {"name": "Prologue"},
            "ACT1": {"title": "Act One"},
            "bare": {}
        }}))
        .unwrap();
        assert_eq!(
            entries,
            vec![
                StoryIndexEntry { id: "main_00".into(), title: "Prologue".into() },
                StoryIndexEntry { id: "act1".into(), title: "Act One".into() },
                StoryIndexEntry { id: "bare".into(), title: "bare".into() },
            ]
        );
    }

    #[test]
    fn story_index_entry_shape() {
        let entries = parse_story_index(&json!({"entry": [
            {"id": "S1", "name": "First"},
            {"key": 42},
            {"code": "", "title": "dropped"},
            "junk"
        ]}))
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "s1");
        assert_eq!(entries[1], StoryIndexEntry { id: "42".into(), title: "42".into() });
    }

    #[test]
    fn story_index_unknown_shape() {
        assert!(parse_story_index(&json!({"stories": []})).is_none());
        assert!(parse_story_index(&json!([1, 2])).is_none());
    }

    #[test]
    fn story_index_lookup_warnings() {
        let dir = temp_dir();
        let index = load_story_index(&dir);
        assert_eq!(index.warnings, vec!["story index not found"]);

        std::fs::write(dir.join("storyinfo.json"), r#"{"weird": true}"#).unwrap();
        let index = load_story_index(&dir);
        assert_eq!(index.warnings, vec!["Unrecognized story index structure in storyinfo.json"]);

        std::fs::write(dir.join("story_review_table.json"), r#"{"infos": {"a": {}}}"#).unwrap();
        let index = load_story_index(&dir);
        assert!(index.warnings.is_empty());
        assert_eq!(index.entries.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}

//! Core domain types for extracted characters, stories, indexes and bundles.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version tag written into every `index.json`.
pub const INDEX_VERSION: &str = "ak-v3";

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

/// One `characters/<slug>.json` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rarity: Value,
    #[serde(default)]
    pub profession: Value,
    #[serde(default)]
    pub sub_profession_id: Value,
    #[serde(default)]
    pub profile: Profile,
    /// Opaque voice-line mapping, copied from the charword table.
    #[serde(default)]
    pub voice_lines: Map<String, Value>,
    /// Reserved for hand-written style notes; always emitted empty.
    #[serde(default)]
    pub speech_style: Map<String, Value>,
    #[serde(default)]
    pub story_quotes: Vec<String>,
}

/// Handbook-derived profile. Every field is optional; a character without a
/// handbook entry serializes this as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appellation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biography: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth: Option<Value>,
}

impl Profile {
    pub fn is_empty(&self) -> bool {
        *self == Profile::default()
    }
}

// ---------------------------------------------------------------------------
// Story
// ---------------------------------------------------------------------------

/// One `stories/<id>.json` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    /// Distinct normalized speaker names, in order of first appearance.
    #[serde(default)]
    pub characters_involved: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Story {
    /// Iterate every speech of every scene of every chapter, in order.
    pub fn speeches(&self) -> impl Iterator<Item = &Speech> {
        self.chapters
            .iter()
            .flat_map(|c| c.scenes.iter())
            .flat_map(|s| s.speeches.iter())
    }

    /// Total number of speeches across all chapters.
    pub fn speech_count(&self) -> usize {
        self.speeches().count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub speeches: Vec<Speech>,
}

/// A single attributed line of dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speech {
    pub speaker: String,
    pub text: String,
}

impl Speech {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Knowledge bundles
// ---------------------------------------------------------------------------

/// One line of a `bundle_NNN.jsonl` shard. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: String,
    pub title: String,
    pub source: String,
    pub tags: Vec<String>,
    pub text: String,
}

/// Report for one written shard.
#[derive(Debug, Clone, Serialize)]
pub struct ShardMeta {
    pub filename: String,
    pub records: usize,
    pub size_bytes: u64,
    pub sha256: String,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// The `index.json` written at the root of every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildIndex {
    pub version: String,
    pub generated_at: DateTime<FixedOffset>,
    /// Character slug to relative file path.
    pub characters: BTreeMap<String, String>,
    /// Story id to relative file path.
    pub stories: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<MirrorSummary>,
    /// Relative path of the image manifest, when one was built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<String>,
    pub notes: IndexNotes,
}

/// Diagnostics collected over one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexNotes {
    /// Name of the resolved source layout, if any matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default)]
    pub missing_tables: Vec<String>,
    #[serde(default)]
    pub table_warnings: Vec<String>,
    #[serde(default)]
    pub character_warnings: Vec<String>,
    #[serde(default)]
    pub story_warnings: Vec<String>,
    #[serde(default)]
    pub slug_collisions: Vec<String>,
    #[serde(default)]
    pub story_quotes_attached: usize,
    #[serde(default)]
    pub character_count: usize,
    #[serde(default)]
    pub story_count: usize,
}

/// Listing of raw files copied into the snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorSummary {
    pub excel_count: usize,
    pub story_txt_count: usize,
    pub story_json_count: usize,
    pub paths: MirrorPaths,
    pub lists: MirrorLists,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorPaths {
    pub excel: String,
    pub story: String,
    pub story_json: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorLists {
    pub excel: Vec<String>,
    pub story: Vec<String>,
    pub story_json: Vec<String>,
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// One slug's entry in `image_manifest.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub images: Vec<String>,
    pub tags: Vec<String>,
}

/// `image_manifest.json`: slug to images and tags.
pub type ImageManifest = BTreeMap<String, ImageEntry>;

// ---------------------------------------------------------------------------
// CollisionPolicy
// ---------------------------------------------------------------------------

/// How to resolve two entities normalizing to the same slug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// The later entity overwrites the earlier file.
    #[default]
    LastWins,
    /// The later entity is skipped.
    FirstWins,
    /// The later entity gets a numeric suffix (`-2`, `-3`, ...).
    Suffix,
}

impl std::fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LastWins => "last-wins",
            Self::FirstWins => "first-wins",
            Self::Suffix => "suffix",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for CollisionPolicy {
    type Err = crate::error::AkDataError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "last-wins" => Ok(Self::LastWins),
            "first-wins" => Ok(Self::FirstWins),
            "suffix" => Ok(Self::Suffix),
            other => Err(crate::error::AkDataError::config(format!(
                "unknown collision policy '{other}': expected 'last-wins', 'first-wins', or 'suffix'"
            ))),
        }
    }
}

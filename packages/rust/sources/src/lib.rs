//! Locating and reading a raw data dump.
//!
//! [`layouts`] resolves a source root to its excel and story directories;
//! [`tables`] loads the character tables and the story index from there.

pub mod layouts;
pub mod tables;

pub use layouts::{FlatLayout, LayoutRegistry, PrefixedLayout, ResolvedSource, SourceLayout};
pub use tables::{
    CHARACTER_TABLE, CHARWORD_TABLE, CharacterEntry, HANDBOOK_TABLE, STORY_INDEX_CANDIDATES,
    SourceTables, StoryIndex, StoryIndexEntry, first_truthy, load_story_index,
    parse_story_index, read_json, truthy,
};

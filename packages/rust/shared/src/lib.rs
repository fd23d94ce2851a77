//! Shared types, error model, and configuration for akdata.
//!
//! This crate is the foundation depended on by all other akdata crates.
//! It provides:
//! - [`AkDataError`], the unified error type
//! - Domain types ([`Character`], [`Story`], [`KnowledgeRecord`], [`BuildIndex`])
//! - Slug helpers ([`slugify`], [`normalize_speaker`])
//! - Configuration ([`AppConfig`], [`ExtractOptions`], [`BundleOptions`], config loading)

pub mod config;
pub mod error;
pub mod slug;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BundleOptions, BundleSection, ExtractOptions, ExtractSection, ImagesSection,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{AkDataError, Result};
pub use slug::{normalize_speaker, slugify};
pub use types::{
    BuildIndex, Chapter, Character, CollisionPolicy, INDEX_VERSION, ImageEntry, ImageManifest,
    IndexNotes, KnowledgeRecord, MirrorLists, MirrorPaths, MirrorSummary, Profile, Scene,
    ShardMeta, Speech, Story,
};

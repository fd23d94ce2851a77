//! Core pipeline orchestration and domain logic for akdata.
//!
//! This crate turns a resolved data dump into a published snapshot
//! ([`pipeline::run_extract`]), packs an extracted snapshot into knowledge
//! bundles ([`bundle::build_bundles`]), and scans image folders
//! ([`images::write_image_manifest`]).

pub mod assembler;
pub mod bundle;
pub mod characters;
pub mod context;
pub mod images;
pub mod mirror;
pub mod pipeline;
pub mod quotes;
mod slugs;
pub mod stories;

pub use bundle::{BundleReport, Bundler, build_bundles, write_bundles};
pub use context::{BuildContext, PublishedPaths};
pub use images::{scan_images, write_image_manifest};
pub use pipeline::{ExtractConfig, ExtractResult, ProgressReporter, SilentProgress, run_extract};

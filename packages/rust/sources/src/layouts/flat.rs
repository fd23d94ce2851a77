//! Flat (fallback) layout: the tables sit directly in the source root.

use std::path::{Path, PathBuf};

use super::SourceLayout;
use crate::tables::{CHARACTER_TABLE, CHARWORD_TABLE, HANDBOOK_TABLE};

/// Matches any root that holds at least one of the known tables.
pub struct FlatLayout;

impl SourceLayout for FlatLayout {
    fn detect(&self, root: &Path) -> bool {
        [CHARACTER_TABLE, HANDBOOK_TABLE, CHARWORD_TABLE]
            .iter()
            .any(|name| root.join(name).is_file())
    }

    fn excel_dir(&self, root: &Path) -> PathBuf {
        root.to_path_buf()
    }

    fn story_dir(&self, root: &Path) -> PathBuf {
        root.join("story")
    }

    /// Subdirectories of a flat root are unrelated content.
    fn nested_tables(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "flat"
    }
}

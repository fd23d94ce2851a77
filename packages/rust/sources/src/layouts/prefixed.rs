//! Layouts where `excel/` and `story/` sit under a fixed directory prefix.

use std::path::{Path, PathBuf};

use super::SourceLayout;

/// `<root>/<prefix...>/excel` + `<root>/<prefix...>/story`.
///
/// Covers the raw client dump (`gamedata/`), the hot-update dump
/// (`dyn/gamedata/`), and a previously mirrored snapshot (no prefix).
pub struct PrefixedLayout {
    name: &'static str,
    prefix: &'static [&'static str],
}

impl PrefixedLayout {
    pub fn gamedata() -> Self {
        Self {
            name: "gamedata",
            prefix: &["gamedata"],
        }
    }

    pub fn dyn_gamedata() -> Self {
        Self {
            name: "dyn-gamedata",
            prefix: &["dyn", "gamedata"],
        }
    }

    pub fn snapshot() -> Self {
        Self {
            name: "snapshot",
            prefix: &[],
        }
    }

    fn base(&self, root: &Path) -> PathBuf {
        self.prefix.iter().fold(root.to_path_buf(), |p, seg| p.join(seg))
    }
}

impl SourceLayout for PrefixedLayout {
    fn detect(&self, root: &Path) -> bool {
        self.excel_dir(root).is_dir()
    }

    fn excel_dir(&self, root: &Path) -> PathBuf {
        self.base(root).join("excel")
    }

    fn story_dir(&self, root: &Path) -> PathBuf {
        self.base(root).join("story")
    }

    fn name(&self) -> &str {
        self.name
    }
}

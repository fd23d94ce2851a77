//! Source layout trait and built-in layouts.
//!
//! Data dumps arrive in a handful of on-disk arrangements. A layout knows
//! where the excel tables and story files live relative to the source root.

mod flat;
mod prefixed;

use std::path::{Path, PathBuf};

use akdata_shared::{AkDataError, Result};

pub use flat::FlatLayout;
pub use prefixed::PrefixedLayout;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Trait for a known source arrangement.
///
/// Layouts are tried in priority order; [`FlatLayout`] is the last fallback.
pub trait SourceLayout: Send + Sync {
    /// Returns `true` if `root` is arranged this way.
    fn detect(&self, root: &Path) -> bool;

    /// Directory holding `character_table.json` and friends.
    fn excel_dir(&self, root: &Path) -> PathBuf;

    /// Directory holding per-story `.json`/`.txt` files.
    fn story_dir(&self, root: &Path) -> PathBuf;

    /// Whether tables may sit in subdirectories of the excel directory.
    fn nested_tables(&self) -> bool {
        true
    }

    /// Layout name used in config, CLI flags and tracing.
    fn name(&self) -> &str;
}

/// A layout applied to a concrete root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Name of the matching layout.
    pub layout: String,
    /// Excel table directory (exists).
    pub excel_dir: PathBuf,
    /// Story directory, if it exists.
    pub story_dir: Option<PathBuf>,
    /// Whether subdirectories of `excel_dir` hold tables too.
    pub nested_tables: bool,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered layouts in priority order.
pub struct LayoutRegistry {
    layouts: Vec<Box<dyn SourceLayout>>,
}

impl LayoutRegistry {
    /// Create a registry with all built-in layouts (most specific first).
    pub fn new() -> Self {
        Self {
            layouts: vec![
                Box::new(PrefixedLayout::gamedata()),
                Box::new(PrefixedLayout::dyn_gamedata()),
                Box::new(PrefixedLayout::snapshot()),
                Box::new(FlatLayout),
            ],
        }
    }

    /// First layout that matches `root`.
    pub fn detect(&self, root: &Path) -> Option<&dyn SourceLayout> {
        self.layouts
            .iter()
            .find(|layout| layout.detect(root))
            .map(|layout| layout.as_ref())
    }

    /// Layout registered under `name`.
    pub fn by_name(&self, name: &str) -> Option<&dyn SourceLayout> {
        self.layouts
            .iter()
            .find(|layout| layout.name() == name)
            .map(|layout| layout.as_ref())
    }

    /// Names of every registered layout, in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.layouts.iter().map(|l| l.name()).collect()
    }

    /// Resolve `root` with the requested layout (`"auto"` to detect).
    ///
    /// Returns `Ok(None)` when no layout matches or the forced layout's excel
    /// directory is missing. An unknown layout name is a config error.
    pub fn resolve(&self, root: &Path, requested: &str) -> Result<Option<ResolvedSource>> {
        let layout = if requested == "auto" {
            self.detect(root)
        } else {
            let layout = self.by_name(requested).ok_or_else(|| {
                AkDataError::config(format!(
                    "unknown layout '{requested}': expected 'auto' or one of {}",
                    self.names().join(", ")
                ))
            })?;
            layout.detect(root).then_some(layout)
        };

        Ok(layout.map(|layout| {
            let story_dir = layout.story_dir(root);
            ResolvedSource {
                layout: layout.name().to_string(),
                excel_dir: layout.excel_dir(root),
                story_dir: story_dir.is_dir().then_some(story_dir),
                nested_tables: layout.nested_tables(),
            }
        }))
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}

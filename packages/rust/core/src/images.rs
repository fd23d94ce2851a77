//! Image manifest: groups image files by character slug and derives tags
//! from tokens in their file names.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

use akdata_shared::{ImageManifest, Result};

use crate::assembler::write_json;
use crate::context::walk_error;

/// File-name token to tag.
const TOKEN_TAGS: &[(&str, &str)] = &[
    ("whitecoat", "白衣"),
    ("labcoat", "白衣"),
    ("glasses", "メガネ"),
    ("suit", "スーツ"),
    ("robe", "ローブ"),
    ("longhair", "長髪"),
    ("shorthair", "短髪"),
    ("silverhair", "銀髪"),
    ("whitehair", "白髪"),
    ("blonde", "金髪"),
    ("blackhair", "黒髪"),
    ("formal", "礼装"),
];

static STEM_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_\-.]+").expect("valid regex"));

/// Slug an image belongs to: the first token of its lower-cased stem.
pub fn slug_from_stem(stem: &str) -> String {
    let lowered = stem.to_lowercase();
    STEM_SPLIT_RE
        .split(&lowered)
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Sorted, de-duplicated tags whose tokens occur in the lower-cased stem.
pub fn tags_from_stem(stem: &str) -> Vec<String> {
    let lowered = stem.to_lowercase();
    let mut tags: Vec<String> = TOKEN_TAGS
        .iter()
        .filter(|(token, _)| lowered.contains(token))
        .map(|(_, tag)| tag.to_string())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Walk `root` and build the manifest.
///
/// Returns `None` (with a warning) when `root` is not a directory.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn scan_images(root: &Path, extensions: &[String]) -> Result<Option<ImageManifest>> {
    if !root.is_dir() {
        warn!("image directory not found");
        return Ok(None);
    }

    let mut manifest = ImageManifest::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
        if !matches_ext {
            continue;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let slug = slug_from_stem(&stem);
        if slug.is_empty() {
            warn!(file = %path.display(), "image name has no slug token, skipping");
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let slot = manifest.entry(slug).or_default();
        slot.images.push(rel);
        for tag in tags_from_stem(&stem) {
            if !slot.tags.contains(&tag) {
                slot.tags.push(tag);
            }
        }
    }

    info!(entries = manifest.len(), "image scan complete");
    Ok(Some(manifest))
}

/// Scan `root` and write the manifest to `out`. Returns the entry count, or
/// `None` when the image directory is missing.
pub fn write_image_manifest(root: &Path, out: &Path, extensions: &[String]) -> Result<Option<usize>> {
    let Some(manifest) = scan_images(root, extensions)? else {
        return Ok(None);
    };
    write_json(out, &manifest)?;
    Ok(Some(manifest.len()))
}

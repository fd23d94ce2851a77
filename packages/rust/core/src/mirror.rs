//! Raw-file mirror: copies excel tables and story scripts into the snapshot.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use akdata_shared::{AkDataError, MirrorLists, MirrorPaths, MirrorSummary, Result};
use akdata_sources::ResolvedSource;

use crate::assembler::write_json;
use crate::context::walk_error;

/// `story_json/<rel>.json` wrapper around one story script.
#[derive(Debug, Serialize)]
struct WrappedScript<'a> {
    path: &'a str,
    name: &'a str,
    text: &'a str,
}

/// Copy `*.json` from the excel directory into `<root>/excel` and `*.txt`
/// from the story directory into `<root>/story`, optionally wrapping each
/// script as `<root>/story_json/<rel>.json`.
///
/// Nothing under `exclude` (the output root) is copied, so an output
/// directory nested in the source tree is never mirrored into itself.
#[instrument(skip_all, fields(excel = %source.excel_dir.display(), wrap_story_txt = wrap_story_txt))]
pub fn mirror_sources(
    source: &ResolvedSource,
    snapshot_root: &Path,
    exclude: &Path,
    wrap_story_txt: bool,
) -> Result<MirrorSummary> {
    let excel = copy_matching(
        &source.excel_dir,
        &snapshot_root.join("excel"),
        "json",
        source.nested_tables,
        exclude,
    )?;
    let story = match &source.story_dir {
        Some(dir) => copy_matching(dir, &snapshot_root.join("story"), "txt", true, exclude)?,
        None => Vec::new(),
    };

    let mut story_json = Vec::new();
    if wrap_story_txt {
        let story_out = snapshot_root.join("story");
        let json_out = snapshot_root.join("story_json");
        for rel in &story {
            story_json.push(wrap_script(&story_out, &json_out, rel)?);
        }
    }

    let summary = MirrorSummary {
        excel_count: excel.len(),
        story_txt_count: story.len(),
        story_json_count: story_json.len(),
        paths: MirrorPaths {
            excel: "excel/".into(),
            story: "story/".into(),
            story_json: wrap_story_txt.then(|| "story_json/".to_string()),
        },
        lists: MirrorLists {
            excel,
            story,
            story_json,
        },
    };
    info!(
        excel = summary.excel_count,
        story_txt = summary.story_txt_count,
        story_json = summary.story_json_count,
        "mirror complete"
    );
    Ok(summary)
}

/// Copy files with extension `ext` (case-insensitive), keeping hierarchy.
/// Returns the copied relative paths with `/` separators, sorted.
fn copy_matching(
    src: &Path,
    dst: &Path,
    ext: &str,
    recursive: bool,
    exclude: &Path,
) -> Result<Vec<String>> {
    let mut copied = Vec::new();
    if !src.is_dir() {
        return Ok(copied);
    }
    let src_buf = src.canonicalize().map_err(|e| AkDataError::io(src, e))?;
    let src = src_buf.as_path();
    let exclude = exclude
        .canonicalize()
        .unwrap_or_else(|_| exclude.to_path_buf());

    let mut walker = WalkDir::new(src).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }
    for entry in walker
        .into_iter()
        .filter_entry(|e| !e.path().starts_with(&exclude))
    {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), ext) {
            continue;
        }
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let out = dst.join(rel);
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AkDataError::io(parent, e))?;
        }
        std::fs::copy(entry.path(), &out).map_err(|e| AkDataError::io(&out, e))?;
        copied.push(rel.to_string_lossy().replace('\\', "/"));
    }

    debug!(src = %src.display(), count = copied.len(), ext, "copied files");
    Ok(copied)
}

fn wrap_script(story_root: &Path, json_root: &Path, rel: &str) -> Result<String> {
    let src = story_root.join(rel);
    let bytes = std::fs::read(&src).map_err(|e| AkDataError::io(&src, e))?;
    let text = String::from_utf8_lossy(&bytes);
    let name = Path::new(rel)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let out_rel: PathBuf = Path::new(rel).with_extension("json");
    write_json(
        &json_root.join(&out_rel),
        &WrappedScript {
            path: rel,
            name: &name,
            text: &text,
        },
    )?;
    Ok(out_rel.to_string_lossy().replace('\\', "/"))
}

pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

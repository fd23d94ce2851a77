//! Output writers shared by the extraction stages.
//!
//! Every JSON file in a snapshot goes through [`write_json`]: pretty-printed,
//! UTF-8 without escaping, written to a temp file and renamed into place.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use akdata_shared::{AkDataError, BuildIndex, Result};

/// Serialize `value` as pretty JSON and write it atomically to `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AkDataError::validation(format!("failed to serialize JSON: {e}")))?;
    write_atomic(path, json.as_bytes())?;
    debug!(path = %path.display(), "wrote JSON");
    Ok(())
}

/// Read a JSON file written by [`write_json`].
pub fn read_json_as<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| AkDataError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| AkDataError::parse(format!("{}: {e}", path.display())))
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AkDataError::io(parent, e))?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, bytes).map_err(|e| AkDataError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| AkDataError::io(path, e))?;
    Ok(())
}

/// Write `index.json` at the root of the staging tree.
#[instrument(skip_all, fields(
    characters = index.characters.len(),
    stories = index.stories.len(),
))]
pub fn write_index(staging: &Path, index: &BuildIndex) -> Result<()> {
    write_json(&staging.join("index.json"), index)
}

//! Per-run build context: staging directory and snapshot publishing.
//!
//! Every extraction stage writes into a private staging directory. Only
//! once the whole snapshot (index included) is in place does [`publish`]
//! move it to `latest/` and copy it to `release/<date>/`, each by atomic
//! directory replacement. A context dropped without publishing removes its
//! staging directory and leaves earlier outputs untouched.
//!
//! [`publish`]: BuildContext::publish

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use akdata_shared::{AkDataError, Result};

/// Where a published snapshot landed.
#[derive(Debug, Clone)]
pub struct PublishedPaths {
    pub latest: PathBuf,
    pub release: PathBuf,
}

/// Explicit per-run state threaded through every extraction stage.
#[derive(Debug)]
pub struct BuildContext {
    out_root: PathBuf,
    staging: PathBuf,
    generated_at: DateTime<FixedOffset>,
    published: bool,
}

impl BuildContext {
    /// Create a context stamped with the current local time.
    pub fn create(out_root: &Path) -> Result<Self> {
        Self::with_timestamp(out_root, Local::now().fixed_offset())
    }

    /// Create a context with an explicit generation timestamp.
    pub fn with_timestamp(out_root: &Path, generated_at: DateTime<FixedOffset>) -> Result<Self> {
        let staging = out_root.join(format!(".staging-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&staging).map_err(|e| AkDataError::io(&staging, e))?;
        debug!(path = %staging.display(), "staging directory created");

        Ok(Self {
            out_root: out_root.to_path_buf(),
            staging,
            generated_at,
            published: false,
        })
    }

    /// Root that receives `latest/` and `release/`.
    pub fn out_root(&self) -> &Path {
        &self.out_root
    }

    /// The private directory all stages write into.
    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn generated_at(&self) -> DateTime<FixedOffset> {
        self.generated_at
    }

    /// `YYYY-MM-DD` of the generation timestamp.
    pub fn release_date(&self) -> String {
        self.generated_at.format("%Y-%m-%d").to_string()
    }

    /// Create (if needed) and return a subdirectory of the staging tree.
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.staging.join(name);
        std::fs::create_dir_all(&dir).map_err(|e| AkDataError::io(&dir, e))?;
        Ok(dir)
    }

    /// Publish the staging tree as `release/<date>/` and `latest/`.
    #[instrument(skip_all, fields(out = %self.out_root.display(), date = %self.release_date()))]
    pub fn publish(mut self) -> Result<PublishedPaths> {
        let release_root = self.out_root.join("release");
        std::fs::create_dir_all(&release_root).map_err(|e| AkDataError::io(&release_root, e))?;

        let date = self.release_date();
        let release = release_root.join(&date);
        let release_tmp = release_root.join(format!(".{date}-{}.tmp", Uuid::now_v7()));
        if let Err(e) = copy_tree(&self.staging, &release_tmp) {
            let _ = std::fs::remove_dir_all(&release_tmp);
            return Err(e);
        }
        replace_dir(&release_tmp, &release)?;

        let latest = self.out_root.join("latest");
        replace_dir(&self.staging, &latest)?;
        self.published = true;

        info!(
            latest = %latest.display(),
            release = %release.display(),
            "snapshot published"
        );
        Ok(PublishedPaths { latest, release })
    }
}

impl Drop for BuildContext {
    fn drop(&mut self) {
        if !self.published && self.staging.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.staging) {
                warn!(path = %self.staging.display(), error = %e, "failed to remove staging directory");
            }
        }
    }
}

/// Swap `new` into place at `target`.
///
/// An existing `target` is renamed aside first and deleted only after the
/// new directory is in place; if that rename fails it is restored.
pub(crate) fn replace_dir(new: &Path, target: &Path) -> Result<()> {
    let old = target.exists().then(|| {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        target.with_file_name(format!(".{name}.old-{}", Uuid::now_v7()))
    });

    if let Some(old) = &old {
        std::fs::rename(target, old).map_err(|e| AkDataError::io(target, e))?;
    }

    if let Err(e) = std::fs::rename(new, target) {
        if let Some(old) = &old {
            let _ = std::fs::rename(old, target);
        }
        return Err(AkDataError::io(target, e));
    }

    if let Some(old) = &old {
        if let Err(e) = std::fs::remove_dir_all(old) {
            warn!(path = %old.display(), error = %e, "failed to remove replaced directory");
        }
    }
    Ok(())
}

/// Recursively copy the directory `from` to `to`.
pub(crate) fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(from, e))?;
        let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest).map_err(|e| AkDataError::io(&dest, e))?;
        } else {
            std::fs::copy(entry.path(), &dest).map_err(|e| AkDataError::io(&dest, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

pub(crate) fn walk_error(root: &Path, e: walkdir::Error) -> AkDataError {
    let path = e.path().unwrap_or(root).to_path_buf();
    AkDataError::io(path, e.into())
}

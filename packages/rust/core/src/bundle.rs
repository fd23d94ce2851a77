//! Knowledge bundles: JSONL shards of [`KnowledgeRecord`]s under a byte budget.
//!
//! Records come from two corpora of an extracted snapshot: wrapped story
//! JSON (`story_json/`) and the mirrored excel tables (`excel/`). The
//! [`Bundler`] packs them greedily, in order, into `bundle_NNN.jsonl` files.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use akdata_harvest::harvest_text;
use akdata_shared::{AkDataError, BundleOptions, KnowledgeRecord, Result, ShardMeta};

use crate::assembler::write_atomic;
use crate::context::walk_error;
use crate::mirror::has_extension;

const SHARD_PREFIX: &str = "bundle_";
const SHARD_SUFFIX: &str = ".jsonl";

// ---------------------------------------------------------------------------
// Bundler
// ---------------------------------------------------------------------------

/// Greedy, order-preserving shard writer.
///
/// A record is never split. When adding a record would push a non-empty
/// shard past the budget, the shard is flushed first, so an oversized record
/// always lands in a shard of its own.
#[derive(Debug)]
pub struct Bundler {
    out_dir: PathBuf,
    limit_bytes: u64,
    pending: Vec<String>,
    pending_bytes: u64,
    shards: Vec<ShardMeta>,
}

impl Bundler {
    /// Prepare `out_dir`, removing shards left by an earlier run.
    pub fn new(out_dir: &Path, limit_bytes: u64) -> Result<Self> {
        std::fs::create_dir_all(out_dir).map_err(|e| AkDataError::io(out_dir, e))?;
        remove_stale_shards(out_dir)?;
        Ok(Self {
            out_dir: out_dir.to_path_buf(),
            limit_bytes,
            pending: Vec::new(),
            pending_bytes: 0,
            shards: Vec::new(),
        })
    }

    /// Append one record.
    pub fn push(&mut self, record: &KnowledgeRecord) -> Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| AkDataError::validation(format!("failed to serialize record: {e}")))?;
        let size = line.len() as u64 + 1;

        if !self.pending.is_empty() && self.pending_bytes + size > self.limit_bytes {
            self.flush()?;
        }
        self.pending.push(line);
        self.pending_bytes += size;
        Ok(())
    }

    /// Flush the remainder and return one report per shard written.
    pub fn finish(mut self) -> Result<Vec<ShardMeta>> {
        self.flush()?;
        Ok(self.shards)
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let filename = format!("{SHARD_PREFIX}{:03}{SHARD_SUFFIX}", self.shards.len() + 1);
        let mut body = String::with_capacity(self.pending_bytes as usize);
        for line in &self.pending {
            body.push_str(line);
            body.push('\n');
        }
        write_atomic(&self.out_dir.join(&filename), body.as_bytes())?;

        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        let meta = ShardMeta {
            filename,
            records: self.pending.len(),
            size_bytes: body.len() as u64,
            sha256: format!("{:x}", hasher.finalize()),
        };
        info!(
            shard = %meta.filename,
            records = meta.records,
            size_bytes = meta.size_bytes,
            "shard written"
        );

        self.shards.push(meta);
        self.pending.clear();
        self.pending_bytes = 0;
        Ok(())
    }
}

/// Write `records` as shards into `out_dir`.
pub fn write_bundles<'a>(
    records: impl IntoIterator<Item = &'a KnowledgeRecord>,
    out_dir: &Path,
    limit_bytes: u64,
) -> Result<Vec<ShardMeta>> {
    let mut bundler = Bundler::new(out_dir, limit_bytes)?;
    for record in records {
        bundler.push(record)?;
    }
    bundler.finish()
}

fn remove_stale_shards(out_dir: &Path) -> Result<()> {
    let entries = std::fs::read_dir(out_dir).map_err(|e| AkDataError::io(out_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| AkDataError::io(out_dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(SHARD_PREFIX) && name.ends_with(SHARD_SUFFIX) {
            let path = entry.path();
            std::fs::remove_file(&path).map_err(|e| AkDataError::io(&path, e))?;
            debug!(file = %name, "removed stale shard");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

/// Record for one story payload, or `None` when it has no text.
pub fn story_record(rel: &str, text: String, base_url: &str) -> Option<KnowledgeRecord> {
    if text.trim().is_empty() {
        return None;
    }
    Some(KnowledgeRecord {
        id: format!("story:{rel}"),
        title: format!("story_json/{rel}"),
        source: format!("{}/story_json/{rel}", base_url.trim_end_matches('/')),
        tags: vec!["arknights".into(), "story".into()],
        text,
    })
}

/// Records for one excel table, split into `chunk_chars`-character parts.
pub fn excel_records(name: &str, text: &str, chunk_chars: usize, base_url: &str) -> Vec<KnowledgeRecord> {
    let source = format!("{}/excel/{name}", base_url.trim_end_matches('/'));
    chunk_chars_of(text, chunk_chars)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let part = i + 1;
            let title = if part == 1 {
                format!("excel/{name}")
            } else {
                format!("excel/{name} (part {part})")
            };
            KnowledgeRecord {
                id: format!("excel:{name}#{part}"),
                title,
                source: source.clone(),
                tags: vec!["arknights".into(), "excel".into()],
                text: chunk.to_string(),
            }
        })
        .collect()
}

/// Split `text` into consecutive slices of at most `size` characters.
pub fn chunk_chars_of(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

// ---------------------------------------------------------------------------
// Corpus pipeline
// ---------------------------------------------------------------------------

/// Summary of a `bundle` run.
#[derive(Debug)]
pub struct BundleReport {
    pub story_records: usize,
    pub excel_records: usize,
    pub shards: Vec<ShardMeta>,
}

/// Build records from `story_root` and `excel_root` and write shards.
///
/// Both roots must exist.
#[instrument(skip_all, fields(
    story_root = %story_root.display(),
    excel_root = %excel_root.display(),
    out_dir = %out_dir.display(),
))]
pub fn build_bundles(
    story_root: &Path,
    excel_root: &Path,
    out_dir: &Path,
    opts: &BundleOptions,
) -> Result<BundleReport> {
    opts.validate()?;
    for root in [story_root, excel_root] {
        if !root.is_dir() {
            return Err(AkDataError::missing_source(root));
        }
    }

    let mut bundler = Bundler::new(out_dir, opts.limit_bytes())?;

    let mut story_records = 0;
    for path in limited(story_files(story_root)?, opts.max_story) {
        let rel = path
            .strip_prefix(story_root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        let text = match read_lossy(&path).and_then(|raw| parse_payload(&path, &raw)) {
            Ok(payload) => harvest_text(&payload),
            Err(e) => {
                warn!(file = %rel, error = %e, "story payload unreadable");
                String::new()
            }
        };
        if let Some(record) = story_record(&rel, text, &opts.base_url) {
            bundler.push(&record)?;
            story_records += 1;
        }
    }

    let mut excel_records_count = 0;
    for path in limited(excel_files(excel_root)?, opts.max_excel) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let raw = read_lossy(&path)?;
        let text = match parse_payload(&path, &raw) {
            Ok(payload) => serde_json::to_string(&payload)
                .map_err(|e| AkDataError::validation(format!("failed to serialize {name}: {e}")))?,
            Err(e) => {
                warn!(file = %name, error = %e, "excel table unparseable, using raw text");
                raw
            }
        };
        for record in excel_records(&name, &text, opts.excel_chunk_chars, &opts.base_url) {
            bundler.push(&record)?;
            excel_records_count += 1;
        }
    }

    let shards = bundler.finish()?;
    info!(
        story_records,
        excel_records = excel_records_count,
        shards = shards.len(),
        "bundling complete"
    );
    Ok(BundleReport {
        story_records,
        excel_records: excel_records_count,
        shards,
    })
}

/// File contents with invalid UTF-8 replaced and a leading BOM removed.
fn read_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| AkDataError::io(path, e))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text.as_ref()).to_string())
}

fn parse_payload(path: &Path, raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).map_err(|e| AkDataError::parse(format!("{}: {e}", path.display())))
}

fn limited(files: Vec<PathBuf>, max: usize) -> impl Iterator<Item = PathBuf> {
    let take = if max == 0 { usize::MAX } else { max };
    files.into_iter().take(take)
}

/// `*.json` under `root`, recursively, in path order.
fn story_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if entry.file_type().is_file() && has_extension(entry.path(), "json") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// `*.json` directly in `root`, sorted by name.
fn excel_files(root: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(root).map_err(|e| AkDataError::io(root, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| AkDataError::io(root, e))?.path();
        if path.is_file() && has_extension(&path, "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("akdata-bundle-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn record(id: &str, text: &str) -> KnowledgeRecord {
        KnowledgeRecord {
            id: id.into(),
            title: id.into(),
            source: "s".into(),
            tags: vec![],
            text: text.into(),
        }
    }

    fn line_size(r: &KnowledgeRecord) -> u64 {
        serde_json::to_string(r).unwrap().len() as u64 + 1
    }

    fn shard_ids(dir: &Path, name: &str) -> Vec<String> {
        std::fs::read_to_string(dir.join(name))
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str::<KnowledgeRecord>(l).unwrap().id)
            .collect()
    }

    #[test]
    fn everything_fits_in_one_shard() {
        let tmp = temp_dir();
        let records: Vec<_> = (0..5).map(|i| record(&format!("r{i}"), "x")).collect();
        let shards = write_bundles(&records, &tmp, 1024 * 1024).unwrap();

        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].filename, "bundle_001.jsonl");
        assert_eq!(shards[0].records, 5);
        assert_eq!(shards[0].sha256.len(), 64);
        assert_eq!(shard_ids(&tmp, "bundle_001.jsonl"), ["r0", "r1", "r2", "r3", "r4"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn oversized_record_gets_its_own_shard() {
        let tmp = temp_dir();
        let small = record("small", "x");
        let big = record("big", &"y".repeat(500));
        let limit = line_size(&small) * 3;

        let shards = write_bundles([&small, &big, &small], &tmp, limit).unwrap();
        let names: Vec<_> = shards.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(names, ["bundle_001.jsonl", "bundle_002.jsonl", "bundle_003.jsonl"]);
        assert_eq!(shard_ids(&tmp, "bundle_002.jsonl"), ["big"]);
        assert!(shards[1].size_bytes > limit);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn exact_budget_fits() {
        let tmp = temp_dir();
        let r = record("r", "abc");
        let limit = line_size(&r) * 2;
        let shards = write_bundles([&r, &r, &r], &tmp, limit).unwrap();
        assert_eq!(shards.iter().map(|s| s.records).collect::<Vec<_>>(), [2, 1]);
        assert!(shards.iter().all(|s| s.size_bytes <= limit));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn zero_records_zero_shards_and_stale_removed() {
        let tmp = temp_dir();
        std::fs::write(tmp.join("bundle_007.jsonl"), "old\n").unwrap();
        std::fs::write(tmp.join("keep.txt"), "mine").unwrap();

        let shards = write_bundles(std::iter::empty(), &tmp, 1024).unwrap();
        assert!(shards.is_empty());
        assert!(!tmp.join("bundle_007.jsonl").exists());
        assert!(tmp.join("keep.txt").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn chunking_counts_characters() {
        assert_eq!(chunk_chars_of("abcde", 2), ["ab", "cd", "e"]);
        assert_eq!(chunk_chars_of("アーミヤ", 3), ["アーミ", "ヤ"]);
        assert!(chunk_chars_of("", 5).is_empty());
    }

    #[test]
    fn excel_parts_are_titled() {
        let recs = excel_records("t.json", "abcdef", 4, "https://example.com/latest/");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].id, "excel:t.json#1");
        assert_eq!(recs[0].title, "excel/t.json");
        assert_eq!(recs[1].title, "excel/t.json (part 2)");
        assert_eq!(recs[1].source, "https://example.com/latest/excel/t.json");
        assert_eq!(recs[1].tags, ["arknights", "excel"]);
    }

    #[test]
    fn blank_story_text_is_skipped() {
        assert!(story_record("a.json", "  \n".into(), "https://x").is_none());
        let rec = story_record("obt/a.json", "hi".into(), "https://x").unwrap();
        assert_eq!(rec.id, "story:obt/a.json");
        assert_eq!(rec.source, "https://x/story_json/obt/a.json");
    }

    #[test]
    fn build_bundles_from_fixture_roots() {
        let tmp = temp_dir();
        let story = tmp.join("story_json");
        let excel = tmp.join("excel");
        let out = tmp.join("bundles");
        std::fs::create_dir_all(story.join("obt")).unwrap();
        std::fs::create_dir_all(&excel).unwrap();
        std::fs::write(story.join("obt/b.json"), r#"{"text": "second"}"#).unwrap();
        std::fs::write(story.join("a.json"), r#"{"path": "a.txt", "name": "a", "text": "first"}"#)
            .unwrap();
        std::fs::write(story.join("empty.json"), r#"{"n": 1}"#).unwrap();
        std::fs::write(story.join("broken.json"), "{nope").unwrap();
        std::fs::write(excel.join("x_table.json"), "{\n  \"k\": \"v\"\n}").unwrap();
        std::fs::write(excel.join("raw_table.json"), "not json").unwrap();

        let opts = BundleOptions::from(&akdata_shared::AppConfig::default());
        let report = build_bundles(&story, &excel, &out, &opts).unwrap();
        assert_eq!(report.story_records, 2);
        assert_eq!(report.excel_records, 2);
        assert_eq!(report.shards.len(), 1);

        let ids = shard_ids(&out, "bundle_001.jsonl");
        assert_eq!(ids, ["story:a.json", "story:obt/b.json", "excel:raw_table.json#1", "excel:x_table.json#1"]);

        let content = std::fs::read_to_string(out.join("bundle_001.jsonl")).unwrap();
        assert!(content.contains(r#""text":"{\"k\":\"v\"}""#));
        assert!(content.contains(r#""text":"not json""#));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn invalid_utf8_is_replaced_not_dropped() {
        let tmp = temp_dir();
        let story = tmp.join("story_json");
        let excel = tmp.join("excel");
        let out = tmp.join("bundles");
        std::fs::create_dir_all(&story).unwrap();
        std::fs::create_dir_all(&excel).unwrap();
        std::fs::write(story.join("bad.json"), b"{\"text\": \"caf\xff line\"}").unwrap();
        std::fs::write(excel.join("t_table.json"), b"{\n  \"k\": \"v\xfe\"\n}").unwrap();

        let opts = BundleOptions::from(&akdata_shared::AppConfig::default());
        let report = build_bundles(&story, &excel, &out, &opts).unwrap();
        assert_eq!(report.story_records, 1);
        assert_eq!(report.excel_records, 1);

        let lines: Vec<KnowledgeRecord> = std::fs::read_to_string(out.join("bundle_001.jsonl"))
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0].text, "caf\u{fffd} line");
        assert_eq!(lines[1].text, "{\"k\":\"v\u{fffd}\"}");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn limits_cap_file_counts() {
        let tmp = temp_dir();
        let story = tmp.join("story");
        let excel = tmp.join("excel");
        std::fs::create_dir_all(&story).unwrap();
        std::fs::create_dir_all(&excel).unwrap();
        for i in 0..3 {
            std::fs::write(story.join(format!("s{i}.json")), r#""text""#).unwrap();
            std::fs::write(excel.join(format!("e{i}.json")), "{}").unwrap();
        }

        let mut opts = BundleOptions::from(&akdata_shared::AppConfig::default());
        opts.max_story = 1;
        opts.max_excel = 2;
        let report = build_bundles(&story, &excel, &tmp.join("out"), &opts).unwrap();
        assert_eq!(report.story_records, 1);
        assert_eq!(report.excel_records, 2);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_root_is_fatal() {
        let tmp = temp_dir();
        let opts = BundleOptions::from(&akdata_shared::AppConfig::default());
        let err = build_bundles(&tmp.join("nope"), &tmp, &tmp.join("out"), &opts).unwrap_err();
        assert!(matches!(err, AkDataError::MissingSource { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }
}

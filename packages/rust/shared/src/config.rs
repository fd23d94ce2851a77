//! Application configuration for akdata.
//!
//! User config lives at `~/.akdata/akdata.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AkDataError, Result};
use crate::types::CollisionPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "akdata.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".akdata";

// ---------------------------------------------------------------------------
// Config structs (matching akdata.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Extraction pipeline defaults.
    #[serde(default)]
    pub extract: ExtractSection,

    /// Knowledge bundler defaults.
    #[serde(default)]
    pub bundle: BundleSection,

    /// Image scanner settings.
    #[serde(default)]
    pub images: ImagesSection,
}

/// `[extract]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSection {
    /// Source layout name, or "auto" to detect.
    #[serde(default = "default_layout")]
    pub layout: String,

    /// Upper bound on speeches kept per story.
    #[serde(default = "default_max_speeches")]
    pub max_speeches_per_story: usize,

    /// Upper bound on quotes back-filled into one character per run.
    #[serde(default = "default_max_quotes")]
    pub max_quotes_per_character: usize,

    /// Longest line (in characters) still treated as a quote.
    #[serde(default = "default_max_quote_chars")]
    pub max_quote_chars: usize,

    /// What to do when two entities share a slug.
    #[serde(default)]
    pub collision_policy: CollisionPolicy,

    /// Copy raw excel/story files into the snapshot.
    #[serde(default)]
    pub mirror: bool,

    /// Also wrap mirrored story `.txt` files as JSON.
    #[serde(default)]
    pub wrap_story_txt: bool,
}

impl Default for ExtractSection {
    fn default() -> Self {
        Self {
            layout: default_layout(),
            max_speeches_per_story: default_max_speeches(),
            max_quotes_per_character: default_max_quotes(),
            max_quote_chars: default_max_quote_chars(),
            collision_policy: CollisionPolicy::default(),
            mirror: false,
            wrap_story_txt: false,
        }
    }
}

fn default_layout() -> String {
    "auto".into()
}
fn default_max_speeches() -> usize {
    4000
}
fn default_max_quotes() -> usize {
    300
}
fn default_max_quote_chars() -> usize {
    120
}

/// `[bundle]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleSection {
    /// Shard size budget in MiB.
    #[serde(default = "default_bundle_size_mb")]
    pub bundle_size_mb: u64,

    /// Excel payloads are split into records of at most this many characters.
    #[serde(default = "default_excel_chunk")]
    pub excel_chunk_chars: usize,

    /// Maximum story files to read (0 = unlimited).
    #[serde(default)]
    pub max_story: usize,

    /// Maximum excel files to read (0 = unlimited).
    #[serde(default)]
    pub max_excel: usize,

    /// Public URL the extracted snapshot is served from.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for BundleSection {
    fn default() -> Self {
        Self {
            bundle_size_mb: default_bundle_size_mb(),
            excel_chunk_chars: default_excel_chunk(),
            max_story: 0,
            max_excel: 0,
            base_url: default_base_url(),
        }
    }
}

fn default_bundle_size_mb() -> u64 {
    25
}
fn default_excel_chunk() -> usize {
    15000
}
fn default_base_url() -> String {
    "https://web-skywalker.github.io/ak-mygpt/latest".into()
}

/// `[images]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesSection {
    /// File extensions (lower-case, no dot) picked up by the scanner.
    #[serde(default = "default_image_extensions")]
    pub extensions: Vec<String>,
}

impl Default for ImagesSection {
    fn default() -> Self {
        Self {
            extensions: default_image_extensions(),
        }
    }
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "webp", "gif"]
        .into_iter()
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Runtime options (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime extraction options.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub layout: String,
    pub max_speeches_per_story: usize,
    pub max_quotes_per_character: usize,
    pub max_quote_chars: usize,
    pub collision_policy: CollisionPolicy,
    pub mirror: bool,
    pub wrap_story_txt: bool,
    pub image_extensions: Vec<String>,
}

impl From<&AppConfig> for ExtractOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            layout: config.extract.layout.clone(),
            max_speeches_per_story: config.extract.max_speeches_per_story,
            max_quotes_per_character: config.extract.max_quotes_per_character,
            max_quote_chars: config.extract.max_quote_chars,
            collision_policy: config.extract.collision_policy,
            mirror: config.extract.mirror,
            wrap_story_txt: config.extract.wrap_story_txt,
            image_extensions: config.images.extensions.clone(),
        }
    }
}

/// Runtime bundling options.
#[derive(Debug, Clone)]
pub struct BundleOptions {
    pub bundle_size_mb: u64,
    pub excel_chunk_chars: usize,
    pub max_story: usize,
    pub max_excel: usize,
    pub base_url: String,
}

impl From<&AppConfig> for BundleOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            bundle_size_mb: config.bundle.bundle_size_mb,
            excel_chunk_chars: config.bundle.excel_chunk_chars,
            max_story: config.bundle.max_story,
            max_excel: config.bundle.max_excel,
            base_url: config.bundle.base_url.clone(),
        }
    }
}

impl BundleOptions {
    /// Shard budget in bytes.
    pub fn limit_bytes(&self) -> u64 {
        self.bundle_size_mb * 1024 * 1024
    }

    /// Reject settings that would make the bundler loop or emit garbage.
    pub fn validate(&self) -> Result<()> {
        if self.bundle_size_mb == 0 {
            return Err(AkDataError::config("bundle_size_mb must be at least 1"));
        }
        if self.excel_chunk_chars == 0 {
            return Err(AkDataError::config("excel_chunk_chars must be at least 1"));
        }
        Url::parse(&self.base_url).map_err(|e| {
            AkDataError::config(format!("invalid base_url '{}': {e}", self.base_url))
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.akdata/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| AkDataError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.akdata/akdata.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AkDataError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| AkDataError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AkDataError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AkDataError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AkDataError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

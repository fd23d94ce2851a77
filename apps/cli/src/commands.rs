//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use akdata_core::{ExtractConfig, ExtractResult, ProgressReporter};
use akdata_shared::{
    AppConfig, BundleOptions, CollisionPolicy, ExtractOptions, init_config, load_config,
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// akdata: turn an Arknights data dump into chatbot-ready knowledge.
#[derive(Parser)]
#[command(
    name = "akdata",
    version,
    about = "Extract characters and stories from an Arknights data dump and build knowledge bundles.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract characters and stories into latest/ and release/<date>/.
    Extract {
        /// Root of the data dump.
        #[arg(long)]
        source: PathBuf,

        /// Output root.
        #[arg(long)]
        out: PathBuf,

        /// Source layout: auto, gamedata, dyn-gamedata, snapshot, or flat.
        #[arg(long)]
        layout: Option<String>,

        /// Copy raw excel/story files into the snapshot.
        #[arg(long)]
        mirror: bool,

        /// Wrap mirrored story .txt files as JSON (implies --mirror).
        #[arg(long)]
        wrap_story_txt: bool,

        /// Image directory to scan into the snapshot.
        #[arg(long)]
        images: Option<PathBuf>,

        /// Maximum story quotes attached per character.
        #[arg(long)]
        max_quotes: Option<usize>,

        /// Maximum speeches kept per story.
        #[arg(long)]
        max_speeches: Option<usize>,

        /// Slug collision policy: last-wins, first-wins, or suffix.
        #[arg(long)]
        collision: Option<CollisionPolicy>,
    },

    /// Pack an extracted snapshot into JSONL knowledge bundles.
    Bundle {
        /// Directory of story JSON files (usually <snapshot>/story_json).
        #[arg(long)]
        story_root: PathBuf,

        /// Directory of excel tables (usually <snapshot>/excel).
        #[arg(long)]
        excel_root: PathBuf,

        /// Output directory for bundle_NNN.jsonl files.
        #[arg(long)]
        out_dir: PathBuf,

        /// Shard size budget in MiB.
        #[arg(long)]
        bundle_size_mb: Option<u64>,

        /// Public URL the snapshot is served from.
        #[arg(long)]
        base_url: Option<String>,

        /// Maximum story files to read (0 = unlimited).
        #[arg(long)]
        max_story: Option<usize>,

        /// Maximum excel files to read (0 = unlimited).
        #[arg(long)]
        max_excel: Option<usize>,

        /// Characters per excel record.
        #[arg(long)]
        excel_chunk: Option<usize>,
    },

    /// Scan an image folder and write image_manifest.json.
    ScanImages {
        /// Image directory.
        #[arg(long, default_value = "./images")]
        images: PathBuf,

        /// Manifest output path.
        #[arg(long, default_value = "./image_manifest.json")]
        out: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "akdata=info",
        1 => "akdata=debug",
        _ => "akdata=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Extract {
            source,
            out,
            layout,
            mirror,
            wrap_story_txt,
            images,
            max_quotes,
            max_speeches,
            collision,
        } => {
            let config = load_config()?;
            let mut options = ExtractOptions::from(&config);
            if let Some(layout) = layout {
                options.layout = layout;
            }
            options.mirror |= mirror || wrap_story_txt;
            options.wrap_story_txt |= wrap_story_txt;
            if let Some(n) = max_quotes {
                options.max_quotes_per_character = n;
            }
            if let Some(n) = max_speeches {
                options.max_speeches_per_story = n;
            }
            if let Some(policy) = collision {
                options.collision_policy = policy;
            }
            cmd_extract(ExtractConfig {
                source,
                out,
                images,
                options,
            })
        }
        Command::Bundle {
            story_root,
            excel_root,
            out_dir,
            bundle_size_mb,
            base_url,
            max_story,
            max_excel,
            excel_chunk,
        } => {
            let config = load_config()?;
            let mut opts = BundleOptions::from(&config);
            if let Some(mb) = bundle_size_mb {
                opts.bundle_size_mb = mb;
            }
            if let Some(url) = base_url {
                opts.base_url = url;
            }
            if let Some(n) = max_story {
                opts.max_story = n;
            }
            if let Some(n) = max_excel {
                opts.max_excel = n;
            }
            if let Some(n) = excel_chunk {
                opts.excel_chunk_chars = n;
            }
            cmd_bundle(&story_root, &excel_root, &out_dir, &opts)
        }
        Command::ScanImages { images, out } => {
            let config = load_config()?;
            cmd_scan_images(&images, &out, &config.images.extensions)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_extract(config: ExtractConfig) -> Result<()> {
    info!(
        source = %config.source.display(),
        out = %config.out.display(),
        layout = %config.options.layout,
        "extracting"
    );

    let reporter = CliProgress::new();
    let result = akdata_core::run_extract(&config, &reporter)?;
    let notes = &result.index.notes;

    println!();
    println!("  Snapshot published!");
    println!("  Layout:     {}", notes.layout.as_deref().unwrap_or("(none)"));
    println!("  Characters: {}", notes.character_count);
    println!("  Stories:    {}", notes.story_count);
    println!("  Quotes:     {} characters updated", notes.story_quotes_attached);
    if !notes.missing_tables.is_empty() {
        println!("  Missing:    {}", notes.missing_tables.join(", "));
    }
    let warnings = notes.table_warnings.len()
        + notes.character_warnings.len()
        + notes.story_warnings.len()
        + notes.slug_collisions.len();
    if warnings > 0 {
        println!("  Warnings:   {warnings} (see index.json notes)");
    }
    println!("  Latest:     {}", result.latest.display());
    println!("  Release:    {}", result.release.display());
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_bundle(
    story_root: &Path,
    excel_root: &Path,
    out_dir: &Path,
    opts: &BundleOptions,
) -> Result<()> {
    let spinner = spinner();
    spinner.set_message("Building knowledge bundles");
    let report = akdata_core::build_bundles(story_root, excel_root, out_dir, opts);
    spinner.finish_and_clear();
    let report = report?;

    println!();
    for shard in &report.shards {
        println!(
            "  {}  {:>6} recs  {:>8.2} MB  {}",
            shard.filename,
            shard.records,
            shard.size_bytes as f64 / 1024.0 / 1024.0,
            &shard.sha256[..12],
        );
    }
    println!(
        "  Total records: {} ({} story, {} excel) in {} shard(s)",
        report.story_records + report.excel_records,
        report.story_records,
        report.excel_records,
        report.shards.len(),
    );
    println!();

    Ok(())
}

fn cmd_scan_images(images: &Path, out: &Path, extensions: &[String]) -> Result<()> {
    match akdata_core::write_image_manifest(images, out, extensions)? {
        Some(entries) => println!("Wrote {} with {entries} entries.", out.display()),
        None => println!("Images folder not found: {} (no manifest written)", images.display()),
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid progress template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self { spinner: spinner() }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &ExtractResult) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

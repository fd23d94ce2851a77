//! akdata CLI: game-data extraction and knowledge bundling.
//!
//! Reshapes an Arknights data dump into per-character and per-story JSON
//! snapshots, and packs extracted snapshots into JSONL knowledge bundles.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}

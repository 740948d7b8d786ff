use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

mod animation;
mod assets;
mod audio;
mod camera;
mod config;
mod debug_lines;
mod effect;
mod error;
mod orbit;
mod rendering;
mod runtime;
mod scene_graph;
mod settings;
mod stage;
mod stats;
#[cfg(test)]
mod test_support;
mod ui;
mod window;

use crate::config::StageConfig;

/// Toon-shaded character dance stage
#[derive(Parser, Debug)]
#[command(name = "toonstage", version, about)]
struct Args {
    /// Path to a TOML config file (defaults to ./toonstage.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();
    let config = StageConfig::load(args.config.as_deref()).context("Failed to load config")?;

    pollster::block_on(window::run(config))?;

    Ok(())
}

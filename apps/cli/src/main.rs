//! RecipeForge CLI: assembles recipe and BOM documents from XML fragments.
//!
//! Builds wired, positioned recipes from an ordered list of step names and
//! attaches bills of materials assembled from material metadata.

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

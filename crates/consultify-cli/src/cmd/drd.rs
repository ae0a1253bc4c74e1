use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use consultify_core::assessment::drd::parse_areas;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum DrdSubcommand {
    /// Parse a DRD knowledge-base text dump into axes, areas and levels
    Parse {
        /// Extracted knowledge-base text
        file: PathBuf,
    },
}

pub fn run(subcmd: DrdSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DrdSubcommand::Parse { file } => parse(&file, json),
    }
}

fn parse(file: &Path, json: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let axes = parse_areas(&text);
    if axes.is_empty() {
        anyhow::bail!("no `Area <n><L>.` headers found in {}", file.display());
    }

    if json {
        return print_json(&axes);
    }
    for axis in &axes {
        println!("{}. {}", axis.id, axis.name);
        for area in &axis.areas {
            println!("  {} {} ({} levels)", area.id, area.name, area.levels.len());
        }
    }
    Ok(())
}

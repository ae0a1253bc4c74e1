use crate::output::print_json;
use crate::settings::Settings;
use anyhow::Context;
use clap::Subcommand;
use consultify_core::report;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ReportSubcommand {
    /// Render an assessment report
    Assessment {
        /// Assessment id
        id: String,
        /// Owning organization id
        #[arg(long)]
        org: String,
        /// Output file
        #[arg(long)]
        out: PathBuf,
    },

    /// Render a project status report
    Project {
        /// Project id
        id: String,
        #[arg(long)]
        org: String,
        #[arg(long)]
        out: PathBuf,
    },
}

pub fn run(settings: &Settings, subcmd: ReportSubcommand, json: bool) -> anyhow::Result<()> {
    let (_, conn) = settings.open_db()?;
    let (bytes, out) = match subcmd {
        ReportSubcommand::Assessment { id, org, out } => {
            (report::assessment_report(&conn, &org, &id)?, out)
        }
        ReportSubcommand::Project { id, org, out } => {
            (report::project_report(&conn, &org, &id)?, out)
        }
    };
    std::fs::write(&out, &bytes).with_context(|| format!("failed to write {}", out.display()))?;

    if json {
        print_json(&serde_json::json!({ "path": out, "bytes": bytes.len() }))?;
    } else {
        println!("Wrote {} ({} bytes)", out.display(), bytes.len());
    }
    Ok(())
}

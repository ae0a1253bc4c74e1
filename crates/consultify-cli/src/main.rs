mod cmd;
mod output;
mod settings;

use clap::{Parser, Subcommand};
use cmd::{
    billing::BillingSubcommand, config::ConfigSubcommand, drd::DrdSubcommand, org::OrgSubcommand,
    report::ReportSubcommand, user::UserSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "consultify",
    about = "Consultify consulting backend: run the API server and administer tenants",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true, env = "CONSULTIFY_CONFIG", default_value = "consultify.yaml")]
    config: PathBuf,

    /// SQLite database path (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Create or upgrade the database schema
    Migrate,

    /// Seed a demo organization with sample data
    Seed {
        /// Name for the demo organization
        #[arg(long, default_value = "Demo")]
        label: String,
    },

    /// Manage organizations
    Org {
        #[command(subcommand)]
        subcommand: OrgSubcommand,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        subcommand: UserSubcommand,
    },

    /// Token balance and ledger
    Billing {
        #[command(subcommand)]
        subcommand: BillingSubcommand,
    },

    /// Render PDF reports
    Report {
        #[command(subcommand)]
        subcommand: ReportSubcommand,
    },

    /// DRD knowledge-base tools
    Drd {
        #[command(subcommand)]
        subcommand: DrdSubcommand,
    },

    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = settings::Settings::new(cli.config, cli.db);

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(&settings, port),
        Commands::Migrate => cmd::migrate::run(&settings, cli.json),
        Commands::Seed { label } => cmd::seed::run(&settings, &label, cli.json),
        Commands::Org { subcommand } => cmd::org::run(&settings, subcommand, cli.json),
        Commands::User { subcommand } => cmd::user::run(&settings, subcommand, cli.json),
        Commands::Billing { subcommand } => cmd::billing::run(&settings, subcommand, cli.json),
        Commands::Report { subcommand } => cmd::report::run(&settings, subcommand, cli.json),
        Commands::Drd { subcommand } => cmd::drd::run(subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&settings, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

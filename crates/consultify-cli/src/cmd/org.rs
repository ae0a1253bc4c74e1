use crate::output::{print_json, print_table};
use crate::settings::Settings;
use clap::Subcommand;
use consultify_core::billing;
use consultify_core::db::with_transaction;
use consultify_core::organization::Organization;
use consultify_core::types::Plan;

#[derive(Subcommand)]
pub enum OrgSubcommand {
    /// List every organization
    List,

    /// Create an organization and credit the signup grant
    Create {
        /// Display name; the slug is derived from it
        name: String,
        /// Plan: free, pro, or enterprise
        #[arg(long, default_value = "free")]
        plan: Plan,
    },
}

pub fn run(settings: &Settings, subcmd: OrgSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        OrgSubcommand::List => list(settings, json),
        OrgSubcommand::Create { name, plan } => create(settings, &name, plan, json),
    }
}

fn list(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let (_, conn) = settings.open_db()?;
    let orgs = Organization::list(&conn)?;

    if json {
        return print_json(&orgs);
    }
    if orgs.is_empty() {
        println!("No organizations.");
        return Ok(());
    }
    let rows = orgs
        .iter()
        .map(|o| {
            vec![
                o.id.clone(),
                o.slug.clone(),
                o.plan.to_string(),
                o.token_balance.to_string(),
                if o.is_active { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "SLUG", "PLAN", "BALANCE", "ACTIVE"], rows);
    Ok(())
}

fn create(settings: &Settings, name: &str, plan: Plan, json: bool) -> anyhow::Result<()> {
    let (config, conn) = settings.open_db()?;
    let grant = config.billing.signup_grant;
    let org = with_transaction(&conn, |tx| {
        let org = Organization::create(tx, name, plan)?;
        if grant > 0 {
            billing::credit(tx, &org.id, None, grant, "signup grant")?;
        }
        Organization::get(tx, &org.id)
    })?;

    if json {
        print_json(&org)?;
    } else {
        println!("Created organization {} ({})", org.slug, org.id);
    }
    Ok(())
}

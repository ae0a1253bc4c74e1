use crate::output::{or_dash, print_json, print_table};
use crate::settings::Settings;
use clap::Subcommand;
use consultify_core::audit::{self, AuditEntry};
use consultify_core::billing;
use consultify_core::db::with_transaction;

#[derive(Subcommand)]
pub enum BillingSubcommand {
    /// Show an organization's token balance
    Balance {
        #[arg(long)]
        org: String,
    },

    /// Credit tokens to an organization
    Credit {
        #[arg(long)]
        org: String,
        /// Tokens to add (must be positive)
        amount: i64,
        #[arg(long, default_value = "manual credit")]
        description: String,
    },

    /// Show recent ledger entries, newest first
    Ledger {
        #[arg(long)]
        org: String,
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

pub fn run(settings: &Settings, subcmd: BillingSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        BillingSubcommand::Balance { org } => balance(settings, &org, json),
        BillingSubcommand::Credit {
            org,
            amount,
            description,
        } => credit(settings, &org, amount, &description, json),
        BillingSubcommand::Ledger { org, limit } => ledger(settings, &org, limit, json),
    }
}

fn balance(settings: &Settings, org: &str, json: bool) -> anyhow::Result<()> {
    let (_, conn) = settings.open_db()?;
    // Resolves unknown organizations to a not-found error.
    consultify_core::organization::Organization::get(&conn, org)?;
    let balance = billing::balance(&conn, org)?;

    if json {
        print_json(&serde_json::json!({ "organization_id": org, "balance": balance }))?;
    } else {
        println!("{balance}");
    }
    Ok(())
}

fn credit(
    settings: &Settings,
    org: &str,
    amount: i64,
    description: &str,
    json: bool,
) -> anyhow::Result<()> {
    let (_, conn) = settings.open_db()?;
    let entry = with_transaction(&conn, |tx| {
        let entry = billing::credit(tx, org, None, amount, description)?;
        audit::record(
            tx,
            AuditEntry::new(org, "billing.credit", "organization")
                .entity(org)
                .details(serde_json::json!({
                    "amount": amount,
                    "balance_after": entry.balance_after,
                    "source": "cli",
                })),
        )?;
        Ok(entry)
    })?;

    if json {
        print_json(&entry)?;
    } else {
        println!("Credited {amount} tokens; balance {}", entry.balance_after);
    }
    Ok(())
}

fn ledger(settings: &Settings, org: &str, limit: u32, json: bool) -> anyhow::Result<()> {
    let (_, conn) = settings.open_db()?;
    let entries = billing::ledger(&conn, org, limit, 0)?;

    if json {
        return print_json(&entries);
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.created_at.format("%Y-%m-%d %H:%M").to_string(),
                e.kind.to_string(),
                e.amount.to_string(),
                e.balance_after.to_string(),
                or_dash(e.model.as_deref()),
                e.description.clone(),
            ]
        })
        .collect();
    print_table(&["WHEN", "KIND", "AMOUNT", "BALANCE", "MODEL", "DESCRIPTION"], rows);
    Ok(())
}

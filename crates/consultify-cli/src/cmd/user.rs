use crate::output::{or_dash, print_json, print_table};
use crate::settings::Settings;
use clap::Subcommand;
use consultify_core::types::Role;
use consultify_core::user::{NewUser, User};

#[derive(Subcommand)]
pub enum UserSubcommand {
    /// Create a user inside an organization
    Create {
        /// Organization id
        #[arg(long)]
        org: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "CONSULTIFY_USER_PASSWORD")]
        password: String,
        /// SUPERADMIN, ADMIN, MANAGER, USER, or VIEWER
        #[arg(long, default_value = "USER")]
        role: Role,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },

    /// List an organization's users
    List {
        /// Organization id
        #[arg(long)]
        org: String,
    },
}

pub fn run(settings: &Settings, subcmd: UserSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        UserSubcommand::Create {
            org,
            email,
            password,
            role,
            first_name,
            last_name,
        } => {
            let new = NewUser {
                email,
                password,
                first_name,
                last_name,
                role,
            };
            create(settings, &org, &new, json)
        }
        UserSubcommand::List { org } => list(settings, &org, json),
    }
}

fn create(settings: &Settings, org: &str, new: &NewUser, json: bool) -> anyhow::Result<()> {
    let (config, conn) = settings.open_db()?;
    let user = User::create(&conn, org, new, config.auth.password_min_length)?;

    if json {
        print_json(&user)?;
    } else {
        println!("Created {} {} ({})", user.role, user.email, user.id);
    }
    Ok(())
}

fn list(settings: &Settings, org: &str, json: bool) -> anyhow::Result<()> {
    let (_, conn) = settings.open_db()?;
    let users = User::list(&conn, org)?;

    if json {
        return print_json(&users);
    }
    let rows = users
        .iter()
        .map(|u| {
            vec![
                u.email.clone(),
                u.role.to_string(),
                u.status.to_string(),
                or_dash(u.last_login_at.map(|t| t.format("%Y-%m-%d %H:%M").to_string())),
            ]
        })
        .collect();
    print_table(&["EMAIL", "ROLE", "STATUS", "LAST LOGIN"], rows);
    Ok(())
}

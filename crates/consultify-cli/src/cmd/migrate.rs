use crate::output::print_json;
use crate::settings::Settings;
use consultify_core::db::migrations;

pub fn run(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let (config, conn) = settings.open_db()?;
    let version = migrations::current_version(&conn)?;

    if json {
        print_json(&serde_json::json!({
            "database": config.database.path,
            "schema_version": version,
            "latest_version": migrations::latest_version(),
        }))?;
    } else {
        println!("{}: schema version {version}", config.database.path);
    }
    Ok(())
}

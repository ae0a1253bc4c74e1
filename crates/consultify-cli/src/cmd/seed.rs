use crate::output::print_json;
use crate::settings::Settings;
use consultify_core::seed::seed_demo;

pub fn run(settings: &Settings, label: &str, json: bool) -> anyhow::Result<()> {
    let (config, conn) = settings.open_db()?;
    let demo = seed_demo(&conn, &config, label)?;

    if json {
        print_json(&demo)?;
    } else {
        println!("Seeded organization {}", demo.organization_id);
        println!("  login:    {}", demo.email);
        println!("  password: {}", demo.password);
        println!("  project:  {}", demo.project_id);
    }
    Ok(())
}

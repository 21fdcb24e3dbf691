use meshpoint::settings::*;

fn main() -> anyhow::Result<()> {
    // Secrets print as [redacted]
    let project_settings = parse_settings(None)?;
    println!("Loaded settings: {:?}", project_settings);

    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);

    // $ cargo run --bin settings_demo -- --settings=settings/dev.toml
    // $ MESHPOINT__AUTH__REGISTRY=redis cargo run --bin settings_demo -- --settings=settings/dev.toml
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    println!("Loaded settings: {:?}", project_settings);
    println!("JTI TTL policy: {:?}", project_settings.auth.ttl_policy());

    Ok(())
}

use meshpoint::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    debug!("bootstrap debug log");
    info!("bootstrap info log");
    warn!(target: "security", "bootstrap security log");

    let config = LogConfig {
        filter: "debug,security=warn".to_string(),
    };
    logger.reload_from_config(&config)?;
    trace!("application trace log");
    debug!("application debug log");
    warn!(target: "security", "application security log");

    Ok(())
}

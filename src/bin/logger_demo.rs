use tokenward::logger::*;
use tokenward::settings::Log;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let config = LogConfig::from(&Log {
        filter: "debug,tokenward=trace".to_string(),
    });
    logger.reload_from_config(&config)?;
    trace!("application trace log");
    debug!("application debug log");
    info!(user = "demo", "application info log with a field");

    let rejected = logger.reload_from_config(&LogConfig {
        filter: "=not a filter=".to_string(),
    });
    warn!(rejected = rejected.is_err(), "invalid filter is refused");

    Ok(())
}

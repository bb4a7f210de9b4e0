use anyhow::Context;
use barstat::{aggregator, config::load_config};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the bar
    env_logger::init();

    let config = load_config().context("Invalid configuration")?;
    log::info!("🚀 Starting barstat");

    if config.once {
        aggregator::print_once(&config).context("Failed to print status line")?;
        return Ok(());
    }

    aggregator::run(&config).context("Status loop failed")?;
    log::info!("👋 barstat stopped");
    Ok(())
}
